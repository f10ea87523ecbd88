use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use forcewatch::errors::Result;
use forcewatch::exec::{ActionInvoker, ActionOutcome, ActionRequest};
use forcewatch::types::ActionKind;

#[derive(Debug, Default)]
struct Script {
    requests: Vec<ActionRequest>,
    queued: VecDeque<ActionOutcome>,
    fallback: Option<ActionOutcome>,
    refuse_to_start: bool,
}

/// A fake invoker that:
/// - records every request it receives
/// - answers with queued outcomes first, then with a fallback
///   (`Succeeded` unless configured otherwise).
///
/// Clones share the same record, so a test can keep a handle after moving
/// the invoker into a `Runtime`.
#[derive(Debug, Clone, Default)]
pub struct FakeInvoker {
    script: Arc<Mutex<Script>>,
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `outcome`.
    pub fn always(outcome: ActionOutcome) -> Self {
        let fake = Self::new();
        fake.script.lock().unwrap().fallback = Some(outcome);
        fake
    }

    /// Return an error for every request, as if the command could not start.
    pub fn refusing() -> Self {
        let fake = Self::new();
        fake.script.lock().unwrap().refuse_to_start = true;
        fake
    }

    /// Queue an outcome for the next unanswered request.
    pub fn then(&self, outcome: ActionOutcome) -> &Self {
        self.script.lock().unwrap().queued.push_back(outcome);
        self
    }

    pub fn requests(&self) -> Vec<ActionRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        self.requests().iter().map(|r| r.kind).collect()
    }

    pub fn count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }
}

impl ActionInvoker for FakeInvoker {
    fn invoke(
        &mut self,
        request: ActionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ActionOutcome>> + Send + '_>> {
        let script = Arc::clone(&self.script);

        Box::pin(async move {
            let mut guard = script.lock().unwrap();
            guard.requests.push(request);
            if guard.refuse_to_start {
                return Err(anyhow::anyhow!("fake invoker refused to start").into());
            }
            let outcome = guard
                .queued
                .pop_front()
                .or(guard.fallback)
                .unwrap_or(ActionOutcome::Succeeded);
            Ok(outcome)
        })
    }
}
