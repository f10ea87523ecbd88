// src/dispatch/mod.rs

//! Turning a readiness classification into at most one action per step.
//!
//! [`decide`] looks at a step and its classification and says what to do;
//! [`settle`] records what happened once the action (if any) has run. The
//! split lets the engine keep all I/O between the two calls.

use std::fmt;

use crate::config::ConfigSection;
use crate::exec::ActionOutcome;
use crate::tracker::{
    best_variant, missing_sources, ForcingPolicy, LeadStep, Readiness, StepKey,
};
use crate::types::{ActionKind, FailurePolicy};

/// How failed actions are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureHandling {
    pub policy: FailurePolicy,
    pub max_attempts: u32,
}

impl FailureHandling {
    pub fn from_config(cfg: &ConfigSection) -> Self {
        Self {
            policy: cfg.on_action_failure,
            max_attempts: cfg.max_attempts.max(1),
        }
    }
}

impl Default for FailureHandling {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::Retry,
            max_attempts: 3,
        }
    }
}

/// A layering action to run for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    pub key: StepKey,
    pub kind: ActionKind,
    /// Sources combined by the action, most preferred first.
    pub sources: Vec<String>,
    /// Sources left out because they are incomplete.
    pub missing: Vec<String>,
    /// Dispatched because of a first-pass force rather than a timeout.
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    AlreadyDone,
    Skip,
    Invoke(ActionPlan),
    /// Timed out with nothing usable: close the step without an action.
    Abandon { missing: Vec<String> },
}

pub fn decide(
    key: StepKey,
    step: &LeadStep,
    readiness: Readiness,
    forced: bool,
    policy: &ForcingPolicy,
) -> Decision {
    if step.dispatched {
        return Decision::AlreadyDone;
    }

    match readiness {
        Readiness::FullyReady => Decision::Invoke(ActionPlan {
            key,
            kind: ActionKind::Full,
            sources: policy.sources.iter().map(|s| s.name.clone()).collect(),
            missing: Vec::new(),
            forced: false,
        }),
        Readiness::TimedOut => {
            let missing = missing_sources(step, policy);
            match best_variant(step, policy) {
                Some(variant) => Decision::Invoke(ActionPlan {
                    key,
                    kind: variant.kind,
                    sources: variant.sources,
                    missing,
                    forced,
                }),
                None => Decision::Abandon { missing },
            }
        }
        Readiness::NotReady | Readiness::PartiallyReady => Decision::Skip,
    }
}

/// What a step ended up as after one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Dispatched(ActionKind),
    Skipped,
    AlreadyDone,
    Abandoned,
    Failed { kind: ActionKind, will_retry: bool },
    NeedsAttention { kind: ActionKind },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Dispatched(kind) => write!(f, "dispatched {kind}"),
            Outcome::Skipped => f.write_str("skipped"),
            Outcome::AlreadyDone => f.write_str("already done"),
            Outcome::Abandoned => f.write_str("abandoned"),
            Outcome::Failed { kind, will_retry } => {
                write!(f, "{kind} failed ({})", if *will_retry { "will retry" } else { "giving up" })
            }
            Outcome::NeedsAttention { kind } => write!(f, "{kind} needs attention"),
        }
    }
}

/// Close a step that timed out without any usable source.
pub fn abandon(step: &mut LeadStep) -> Outcome {
    step.dispatched = true;
    step.forced = false;
    Outcome::Abandoned
}

/// Record the result of running `plan` against `step`.
///
/// Every invocation counts as an attempt. A step is only left undispatched
/// after a plain failure under the retry policy with attempts to spare; a
/// forced step stays forced for that retry.
pub fn settle(
    step: &mut LeadStep,
    plan: &ActionPlan,
    result: &ActionOutcome,
    handling: &FailureHandling,
) -> Outcome {
    step.attempts += 1;

    let outcome = settle_result(step, plan, result, handling);
    if step.dispatched {
        step.forced = false;
    }
    outcome
}

fn settle_result(
    step: &mut LeadStep,
    plan: &ActionPlan,
    result: &ActionOutcome,
    handling: &FailureHandling,
) -> Outcome {
    match result {
        ActionOutcome::Succeeded => {
            step.dispatched = true;
            step.action = Some(plan.kind);
            Outcome::Dispatched(plan.kind)
        }
        ActionOutcome::TimedOut => {
            step.dispatched = true;
            step.needs_attention = true;
            step.action = Some(plan.kind);
            Outcome::NeedsAttention { kind: plan.kind }
        }
        ActionOutcome::Failed(_) => match handling.policy {
            FailurePolicy::MarkDone => {
                step.dispatched = true;
                step.action = Some(plan.kind);
                Outcome::Failed {
                    kind: plan.kind,
                    will_retry: false,
                }
            }
            FailurePolicy::Retry if step.attempts < handling.max_attempts => Outcome::Failed {
                kind: plan.kind,
                will_retry: true,
            },
            FailurePolicy::Retry => {
                step.dispatched = true;
                step.needs_attention = true;
                step.action = Some(plan.kind);
                Outcome::NeedsAttention { kind: plan.kind }
            }
        },
    }
}
