// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::dispatch::{FailureHandling, Outcome};
use crate::errors::Result;
use crate::exec::{ActionInvoker, ActionOutcome, ActionRequest};
use crate::fs::FileSystem;
use crate::probe::{newest_across, FsProbe};
use crate::regrid::RegridSpec;
use crate::state::{StateLock, StateStore};
use crate::tracker::readiness::minutes;
use crate::tracker::{ForcingPolicy, StepKey, Timing};

use super::core::CoreRuntime;
use super::events::{emit_all, PassEvent};
use super::{CoreCommand, CoreSettings, StepStatus};

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Another run held the lock; nothing was touched.
    pub locked_out: bool,
    /// Final outcome per tracked step, in cycle/step order.
    pub steps: Vec<(StepKey, Outcome)>,
    /// Outcome per regridded file (`<source>:<YYYYMMDDHH>/<file>`).
    pub regrids: Vec<(String, Outcome)>,
    /// External actions started during the pass.
    pub invocations: usize,
}

impl PassReport {
    pub fn outcome(&self, key: &StepKey) -> Option<&Outcome> {
        self.steps.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }

    pub fn dispatched(&self) -> Vec<(StepKey, Outcome)> {
        self.steps
            .iter()
            .filter(|(_, o)| !matches!(o, Outcome::Skipped | Outcome::AlreadyDone))
            .cloned()
            .collect()
    }
}

/// Borrowed pieces of a pass in progress.
struct PassContext<'a> {
    core: &'a mut CoreRuntime,
    store: &'a StateStore,
    lock: &'a mut StateLock,
    now: DateTime<Utc>,
    started: Instant,
}

impl PassContext<'_> {
    /// Pass time advanced by the wall time spent so far.
    fn clock(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap_or(TimeDelta::zero());
        self.now + elapsed
    }
}

/// Runs one pass over the filesystem and state file, delegating external
/// actions to an `ActionInvoker`.
///
/// This is the IO shell around `CoreRuntime`, which holds all of the
/// readiness and dispatch semantics. This struct handles the lock, the state
/// file, the probe and the (async) invocations.
pub struct Runtime<I: ActionInvoker> {
    cfg: ConfigFile,
    policy: ForcingPolicy,
    regrid: Option<RegridSpec>,
    fs: Arc<dyn FileSystem>,
    invoker: I,
}

impl<I: ActionInvoker> fmt::Debug for Runtime<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("policy", &self.policy.name)
            .field("state_file", &self.cfg.config.state_file)
            .finish_non_exhaustive()
    }
}

impl<I: ActionInvoker> Runtime<I> {
    pub fn new(cfg: ConfigFile, fs: Arc<dyn FileSystem>, invoker: I) -> Result<Self> {
        let policy = ForcingPolicy::from_config(&cfg);
        let regrid = RegridSpec::from_config(&cfg)?;
        Ok(Self {
            cfg,
            policy,
            regrid,
            fs,
            invoker,
        })
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    pub fn policy(&self) -> &ForcingPolicy {
        &self.policy
    }

    fn settings(&self) -> CoreSettings {
        CoreSettings {
            timing: Timing::from_config(&self.cfg.config),
            failure: FailureHandling::from_config(&self.cfg.config),
        }
    }

    /// One full pass: lock, load, observe, refresh, dispatch, regrid, save.
    pub async fn run_pass(&mut self, now: DateTime<Utc>) -> Result<PassReport> {
        let now = now.trunc_subsecs(0);
        let mut report = PassReport::default();

        let started = Instant::now();
        let stale_after = minutes(self.cfg.config.lock_stale_minutes);
        let Some(mut lock) = StateLock::try_acquire(
            Arc::clone(&self.fs),
            self.cfg.lock_file(),
            stale_after,
            now,
        )?
        else {
            warn!(
                lock = ?self.cfg.lock_file(),
                "another run holds the lock; leaving state untouched"
            );
            report.locked_out = true;
            return Ok(report);
        };

        info!(policy = %self.policy.name, "forcewatch pass started");

        let store = StateStore::new(Arc::clone(&self.fs), &self.cfg.config.state_file);
        let state = store.load(now)?.into_state();
        let probe = FsProbe::new(Arc::clone(&self.fs));
        let mut core = CoreRuntime::new(state, self.policy.clone(), self.settings());

        let (newest, failures) = newest_across(&probe, self.policy.input_roots());
        for (root, err) in failures {
            PassEvent::ProbeFailed {
                what: format!("{root:?}"),
                error: format!("{err:#}"),
            }
            .emit();
        }
        debug!(newest = ?newest.map(|t| t.to_string()), "newest issue time across inputs");

        emit_all(&core.observe(newest, now));
        emit_all(&core.refresh(&probe, now));

        let step = core.plan(now);
        emit_all(&step.events);
        report.steps.extend(step.outcomes);
        store.save(core.state())?;

        let mut pass = PassContext {
            core: &mut core,
            store: &store,
            lock: &mut lock,
            now,
            started,
        };
        for command in step.commands {
            self.execute_command(&mut pass, command, &mut report).await?;
        }

        if let Some(spec) = self.regrid.clone() {
            let step = pass.core.plan_regrid(&spec, &probe);
            emit_all(&step.events);
            for command in step.commands {
                self.execute_command(&mut pass, command, &mut report).await?;
            }
        }

        report.steps.sort_by_key(|(k, _)| *k);
        store.save(core.state())?;

        info!(
            invocations = report.invocations,
            acted = report.dispatched().len(),
            regrids = report.regrids.len(),
            "forcewatch pass complete"
        );
        Ok(report)
    }

    /// Execute a single command from the core, settle it and persist the
    /// settlement before anything else runs.
    async fn execute_command(
        &mut self,
        pass: &mut PassContext<'_>,
        command: CoreCommand,
        report: &mut PassReport,
    ) -> Result<()> {
        pass.lock.refresh(pass.clock())?;
        match command {
            CoreCommand::Layer { plan, request } => {
                let result = self.invoke(request, report).await;
                match pass.core.settle(&plan, &result) {
                    Some((outcome, event)) => {
                        event.emit();
                        report.steps.push((plan.key, outcome));
                    }
                    None => warn!(step = %plan.key, "settled step is no longer tracked"),
                }
            }
            CoreCommand::Regrid { job, request } => {
                let result = self.invoke(request, report).await;
                let (outcome, event) = pass.core.settle_regrid(&job, &result);
                event.emit();
                report
                    .regrids
                    .push((format!("{}:{}", job.source, job.candidate.entry()), outcome));
            }
        }
        pass.store.save(pass.core.state())
    }

    async fn invoke(&mut self, request: ActionRequest, report: &mut PassReport) -> ActionOutcome {
        report.invocations += 1;
        let label = request.to_string();
        match self.invoker.invoke(request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(action = %label, error = %err, "could not start action");
                ActionOutcome::Failed(-1)
            }
        }
    }

    /// Classification of every step as the next pass would see it, without
    /// taking the lock, invoking anything or writing state.
    pub fn preview(&self, now: DateTime<Utc>) -> Result<Vec<StepStatus>> {
        let now = now.trunc_subsecs(0);
        let store = StateStore::new(Arc::clone(&self.fs), &self.cfg.config.state_file);
        let state = store.peek()?;
        let probe = FsProbe::new(Arc::clone(&self.fs));
        let mut core = CoreRuntime::new(state, self.policy.clone(), self.settings());

        let (newest, _) = newest_across(&probe, self.policy.input_roots());
        core.observe(newest, now);
        core.refresh(&probe, now);
        Ok(core.statuses(now))
    }
}
