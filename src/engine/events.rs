// src/engine/events.rs

//! Diagnostics produced by the pure core.
//!
//! The core never logs. It returns `PassEvent`s and the shell emits them
//! through `tracing` at the level each one calls for.

use tracing::{debug, error, info, warn};

use crate::tracker::StepKey;
use crate::types::{ActionKind, IssueTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassEvent {
    /// No issue time found under any watched root and nothing tracked.
    NoData,
    /// First cycle ever opened.
    Bootstrapped { issue: IssueTime },
    CycleOpened { issue: IssueTime },
    CyclePruned { issue: IssueTime },
    ProbeFailed { what: String, error: String },
    InputArrived { key: StepKey, input: String },
    CycleClockStarted { issue: IssueTime },
    InputsVeryLate { issue: IssueTime, waited_minutes: i64 },
    Degraded {
        key: StepKey,
        kind: ActionKind,
        sources: Vec<String>,
        missing: Vec<String>,
        forced: bool,
    },
    Abandoned { key: StepKey, missing: Vec<String> },
    ActionSucceeded { target: String, kind: ActionKind },
    ActionFailed {
        target: String,
        kind: ActionKind,
        detail: String,
        will_retry: bool,
    },
    NeedsAttention {
        target: String,
        kind: ActionKind,
        attempts: u32,
        detail: String,
    },
    RegridSeeded { source: String, files: usize },
    RegridPruned { source: String, entries: usize },
}

impl PassEvent {
    pub fn emit(&self) {
        match self {
            PassEvent::NoData => info!("no issue-time directories found under any input root"),
            PassEvent::Bootstrapped { issue } => {
                info!(%issue, "bootstrapped state with first cycle")
            }
            PassEvent::CycleOpened { issue } => info!(%issue, "new cycle observed"),
            PassEvent::CyclePruned { issue } => info!(%issue, "pruned cycle outside horizon"),
            PassEvent::ProbeFailed { what, error } => {
                warn!(target_path = %what, %error, "probe failed; treating as not yet available")
            }
            PassEvent::InputArrived { key, input } => info!(step = %key, %input, "input arrived"),
            PassEvent::CycleClockStarted { issue } => {
                debug!(%issue, "first input of cycle seen; timeout clock started")
            }
            PassEvent::InputsVeryLate {
                issue,
                waited_minutes,
            } => warn!(%issue, waited_minutes, "inputs very late: nothing has arrived for this cycle"),
            PassEvent::Degraded {
                key,
                kind,
                sources,
                missing,
                forced,
            } => warn!(
                step = %key,
                %kind,
                ?sources,
                ?missing,
                forced,
                "dispatching degraded variant"
            ),
            PassEvent::Abandoned { key, missing } => warn!(
                step = %key,
                ?missing,
                "timed out with no complete source; closing step without layering"
            ),
            PassEvent::ActionSucceeded { target, kind } => {
                info!(action = %target, %kind, "action succeeded")
            }
            PassEvent::ActionFailed {
                target,
                kind,
                detail,
                will_retry,
            } => error!(action = %target, %kind, %detail, will_retry, "action failed"),
            PassEvent::NeedsAttention {
                target,
                kind,
                attempts,
                detail,
            } => error!(
                action = %target,
                %kind,
                attempts,
                %detail,
                "action needs manual attention; will not be retried"
            ),
            PassEvent::RegridSeeded { source, files } => info!(
                %source,
                files,
                "first pass for regrid source; recorded existing files without regridding"
            ),
            PassEvent::RegridPruned { source, entries } => {
                debug!(%source, entries, "pruned regrid ledger entries outside horizon")
            }
        }
    }
}

pub fn emit_all(events: &[PassEvent]) {
    for event in events {
        event.emit();
    }
}
