// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! `CoreRuntime` owns the persisted state for the duration of one pass and
//! exposes the pass as a sequence of synchronous calls:
//!
//! 1. [`observe`](CoreRuntime::observe) the newest issue time,
//! 2. [`refresh`](CoreRuntime::refresh) availability through a probe,
//! 3. [`plan`](CoreRuntime::plan) dispatches,
//! 4. [`settle`](CoreRuntime::settle) each invoked action,
//! 5. the same plan/settle pair for regrid.
//!
//! It has no Tokio types and never logs or spawns anything; diagnostics come
//! back as [`PassEvent`]s. The probe is the only outside input, and tests
//! drive it with a `MockFileSystem`.

use chrono::{DateTime, Utc};

use crate::dispatch::{abandon, decide, settle, ActionPlan, Decision, Outcome};
use crate::engine::events::PassEvent;
use crate::engine::{CoreCommand, CoreSettings, CoreStep, RegridJob, StepStatus};
use crate::exec::{ActionOutcome, ActionRequest};
use crate::probe::AvailabilityProbe;
use crate::regrid::{scan, RegridSpec};
use crate::state::PersistedState;
use crate::tracker::{
    classify, inputs_very_late, missing_sources, refresh_availability, start_cycle_clock,
    ForcingPolicy, Readiness, StepKey,
};
use crate::types::{ActionKind, FailurePolicy, IssueTime};

#[derive(Debug)]
pub struct CoreRuntime {
    state: PersistedState,
    policy: ForcingPolicy,
    settings: CoreSettings,
}

impl CoreRuntime {
    pub fn new(state: PersistedState, policy: ForcingPolicy, settings: CoreSettings) -> Self {
        Self {
            state,
            policy,
            settings,
        }
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn into_state(self) -> PersistedState {
        self.state
    }

    pub fn policy(&self) -> &ForcingPolicy {
        &self.policy
    }

    /// Open a cycle for `newest` if it is newer than what is tracked, and
    /// prune cycles that fell out of the horizon.
    pub fn observe(&mut self, newest: Option<IssueTime>, now: DateTime<Utc>) -> Vec<PassEvent> {
        let mut events = Vec::new();
        let Some(newest) = newest else {
            if self.state.is_empty() {
                events.push(PassEvent::NoData);
            }
            return events;
        };

        let was_empty = self.state.is_empty();
        let change = self.state.reinitialize_if_new_cycle(
            newest,
            self.settings.timing.hours_back,
            &self.policy,
            now,
        );
        if let Some(issue) = change.opened {
            events.push(if was_empty {
                PassEvent::Bootstrapped { issue }
            } else {
                PassEvent::CycleOpened { issue }
            });
        }
        events.extend(
            change
                .pruned
                .into_iter()
                .map(|issue| PassEvent::CyclePruned { issue }),
        );
        events
    }

    /// Re-probe every undispatched step of every tracked cycle.
    pub fn refresh(&mut self, probe: &dyn AvailabilityProbe, now: DateTime<Utc>) -> Vec<PassEvent> {
        let mut events = Vec::new();

        for cycle in self.state.cycles.iter_mut() {
            let issue = cycle.issue;
            for step in cycle.steps.iter_mut() {
                let key = StepKey {
                    issue,
                    offset: step.offset,
                };
                let report = refresh_availability(issue, step, &self.policy, probe, now);
                events.extend(
                    report
                        .arrived
                        .into_iter()
                        .map(|input| PassEvent::InputArrived { key, input }),
                );
                events.extend(report.probe_failures.into_iter().map(|(input, error)| {
                    PassEvent::ProbeFailed {
                        what: format!("{key} input {input}"),
                        error,
                    }
                }));
            }

            if start_cycle_clock(cycle, now) {
                events.push(PassEvent::CycleClockStarted { issue });
            }
            if !cycle.all_dispatched() && inputs_very_late(cycle, &self.settings.timing, now) {
                events.push(PassEvent::InputsVeryLate {
                    issue,
                    waited_minutes: (now - cycle.opened_at).num_minutes(),
                });
            }
        }
        events
    }

    /// Classify every step and decide what to do with it.
    ///
    /// Steps that need an action come back as commands; everything else is
    /// settled here. Clears the first-pass marker of every cycle.
    pub fn plan(&mut self, now: DateTime<Utc>) -> CoreStep {
        let mut out = CoreStep::default();

        for cycle in self.state.cycles.iter_mut() {
            for idx in 0..cycle.steps.len() {
                let offset = cycle.steps[idx].offset;
                let key = StepKey {
                    issue: cycle.issue,
                    offset,
                };
                let forced = cycle.is_forced(&cycle.steps[idx], &self.policy);

                let mut readiness = classify(
                    cycle,
                    &cycle.steps[idx],
                    &self.policy,
                    &self.settings.timing,
                    now,
                );
                if forced && readiness != Readiness::FullyReady {
                    readiness = Readiness::TimedOut;
                }

                let step = &mut cycle.steps[idx];
                match decide(key, step, readiness, forced, &self.policy) {
                    Decision::AlreadyDone => out.outcomes.push((key, Outcome::AlreadyDone)),
                    Decision::Skip => out.outcomes.push((key, Outcome::Skipped)),
                    Decision::Abandon { missing } => {
                        out.events.push(PassEvent::Abandoned { key, missing });
                        out.outcomes.push((key, abandon(step)));
                    }
                    Decision::Invoke(plan) => {
                        step.forced = plan.forced;
                        if plan.kind.is_degraded() {
                            out.events.push(PassEvent::Degraded {
                                key,
                                kind: plan.kind,
                                sources: plan.sources.clone(),
                                missing: plan.missing.clone(),
                                forced: plan.forced,
                            });
                        }
                        let request = layer_request(&self.policy, &plan);
                        out.commands.push(CoreCommand::Layer { plan, request });
                    }
                }
            }
            cycle.first_pass_pending = false;
        }
        out
    }

    /// Record how a layering action ended. `None` if the step is not
    /// tracked (anymore).
    pub fn settle(
        &mut self,
        plan: &ActionPlan,
        result: &ActionOutcome,
    ) -> Option<(Outcome, PassEvent)> {
        let step = self
            .state
            .cycle_mut(plan.key.issue)
            .and_then(|c| c.step_mut(plan.key.offset))?;

        let outcome = settle(step, plan, result, &self.settings.failure);
        let event = settlement_event(plan.key.to_string(), plan.kind, &outcome, step.attempts, result);
        Some((outcome, event))
    }

    /// Scan every regrid source and queue each file not handed off yet.
    ///
    /// A source seen for the first time is only recorded unless `backfill`
    /// is set.
    pub fn plan_regrid(&mut self, spec: &RegridSpec, probe: &dyn AvailabilityProbe) -> CoreStep {
        let mut out = CoreStep::default();

        for source in spec.sources.iter() {
            let scanned = match scan(source, probe) {
                Ok(s) => s,
                Err(err) => {
                    out.events.push(PassEvent::ProbeFailed {
                        what: format!("regrid source {} ({:?})", source.name, source.dir),
                        error: format!("{err:#}"),
                    });
                    continue;
                }
            };

            let first_time = !self.state.regrid.contains_key(&source.name);
            let ledger = self.state.regrid.entry(source.name.clone()).or_default();

            if let Some(horizon) = scanned.horizon {
                let entries = ledger.prune_before(horizon);
                if entries > 0 {
                    out.events.push(PassEvent::RegridPruned {
                        source: source.name.clone(),
                        entries,
                    });
                }
            }

            if first_time && !spec.backfill {
                for candidate in scanned.candidates.iter() {
                    ledger.mark_seen(&candidate.entry());
                }
                out.events.push(PassEvent::RegridSeeded {
                    source: source.name.clone(),
                    files: scanned.candidates.len(),
                });
                continue;
            }

            for candidate in scanned.candidates {
                if ledger.is_seen(&candidate.entry()) {
                    continue;
                }
                let request = ActionRequest {
                    kind: ActionKind::Regrid,
                    policy: self.policy.name.clone(),
                    issue: candidate.issue,
                    step: None,
                    valid: None,
                    sources: vec![source.name.clone()],
                    files: vec![candidate.path.clone()],
                };
                out.commands.push(CoreCommand::Regrid {
                    job: RegridJob {
                        source: source.name.clone(),
                        candidate,
                    },
                    request,
                });
            }
        }
        out
    }

    /// Record how a regrid action ended.
    pub fn settle_regrid(&mut self, job: &RegridJob, result: &ActionOutcome) -> (Outcome, PassEvent) {
        let entry = job.candidate.entry();
        let target = format!("{}:{}", job.source, entry);
        let handling = self.settings.failure;
        let ledger = self.state.regrid.entry(job.source.clone()).or_default();
        let attempts = ledger.attempts.get(&entry).copied().unwrap_or(0) + 1;

        let outcome = match result {
            ActionOutcome::Succeeded => {
                ledger.mark_seen(&entry);
                Outcome::Dispatched(ActionKind::Regrid)
            }
            ActionOutcome::TimedOut => {
                ledger.mark_seen(&entry);
                Outcome::NeedsAttention {
                    kind: ActionKind::Regrid,
                }
            }
            ActionOutcome::Failed(_) => {
                let will_retry = ledger.record_failure(&entry, &handling);
                if !will_retry && handling.policy == FailurePolicy::Retry {
                    Outcome::NeedsAttention {
                        kind: ActionKind::Regrid,
                    }
                } else {
                    Outcome::Failed {
                        kind: ActionKind::Regrid,
                        will_retry,
                    }
                }
            }
        };

        let event = settlement_event(target, ActionKind::Regrid, &outcome, attempts, result);
        (outcome, event)
    }

    /// Classification of every tracked step, without changing anything.
    pub fn statuses(&self, now: DateTime<Utc>) -> Vec<StepStatus> {
        let mut out = Vec::new();
        for cycle in self.state.cycles.iter() {
            for step in cycle.steps.iter() {
                let forced = cycle.is_forced(step, &self.policy);
                let mut readiness = classify(cycle, step, &self.policy, &self.settings.timing, now);
                if forced && readiness != Readiness::FullyReady {
                    readiness = Readiness::TimedOut;
                }
                out.push(StepStatus {
                    key: cycle.key(step),
                    readiness,
                    dispatched: step.dispatched,
                    needs_attention: step.needs_attention,
                    available: step
                        .available
                        .iter()
                        .filter(|(_, v)| **v)
                        .map(|(k, _)| k.clone())
                        .collect(),
                    missing_sources: missing_sources(step, &self.policy),
                });
            }
        }
        out
    }
}

/// Build the invoker request for a layering plan: the expected files of
/// every input of every source the plan combines.
fn layer_request(policy: &ForcingPolicy, plan: &ActionPlan) -> ActionRequest {
    let files = plan
        .sources
        .iter()
        .filter_map(|name| policy.source(name))
        .flat_map(|source| source.inputs.iter())
        .map(|input| {
            policy
                .expected_file(input, plan.key.issue, plan.key.offset)
                .path()
        })
        .collect();

    ActionRequest {
        kind: plan.kind,
        policy: policy.name.clone(),
        issue: plan.key.issue,
        step: Some(plan.key.offset),
        valid: Some(policy.step_valid_time(plan.key.issue, plan.key.offset)),
        sources: plan.sources.clone(),
        files,
    }
}

fn settlement_event(
    target: String,
    kind: ActionKind,
    outcome: &Outcome,
    attempts: u32,
    result: &ActionOutcome,
) -> PassEvent {
    let detail = match result {
        ActionOutcome::Succeeded => return PassEvent::ActionSucceeded { target, kind },
        ActionOutcome::Failed(code) => format!("exit code {code}"),
        ActionOutcome::TimedOut => "timed out; output may be partial".to_string(),
    };

    match outcome {
        Outcome::NeedsAttention { .. } => PassEvent::NeedsAttention {
            target,
            kind,
            attempts,
            detail,
        },
        other => PassEvent::ActionFailed {
            target,
            kind,
            detail,
            will_retry: matches!(other, Outcome::Failed { will_retry: true, .. }),
        },
    }
}
