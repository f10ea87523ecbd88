// src/tracker/cycle.rs

//! Forecast cycles and their lead steps.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracker::policy::ForcingPolicy;
use crate::types::{ActionKind, IssueTime};

/// Identity of one unit of work: (cycle issue time, step offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepKey {
    pub issue: IssueTime,
    pub offset: i32,
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:+}", self.issue, self.offset)
    }
}

/// One step of a cycle.
///
/// Field order matters for the TOML state file: plain values first, the
/// availability table last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStep {
    pub offset: i32,

    /// Terminal flag; never reset once set.
    #[serde(default)]
    pub dispatched: bool,

    /// External invocations made for this step so far.
    #[serde(default)]
    pub attempts: u32,

    /// Set when retries ran out or an action may have left partial output.
    #[serde(default)]
    pub needs_attention: bool,

    /// A first-pass force is pending on this step until it is settled.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forced: bool,

    /// The variant that was dispatched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,

    /// When the first input of this step was seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<DateTime<Utc>>,

    /// Input name -> seen on disk. Monotonic.
    #[serde(default)]
    pub available: BTreeMap<String, bool>,
}

impl LeadStep {
    pub fn new(offset: i32, policy: &ForcingPolicy) -> Self {
        Self {
            offset,
            dispatched: false,
            attempts: 0,
            needs_attention: false,
            forced: false,
            action: None,
            first_seen_at: None,
            available: policy.inputs().map(|i| (i.name.clone(), false)).collect(),
        }
    }

    pub fn is_available(&self, input: &str) -> bool {
        self.available.get(input).copied().unwrap_or(false)
    }

    pub fn has_any_input(&self) -> bool {
        self.available.values().any(|v| *v)
    }

    /// Record that `input` is present. Returns true if this changed anything.
    pub fn mark_available(&mut self, input: &str) -> bool {
        let flag = self.available.entry(input.to_string()).or_insert(false);
        if *flag {
            false
        } else {
            *flag = true;
            true
        }
    }
}

/// One model run and its steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastCycle {
    pub issue: IssueTime,

    /// Clock time at which this cycle was first observed.
    pub opened_at: DateTime<Utc>,

    /// Clock time at which any input of any step was first seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_input_clock_time: Option<DateTime<Utc>>,

    /// True until the first dispatch pass over this cycle has run.
    #[serde(default)]
    pub first_pass_pending: bool,

    #[serde(default, rename = "step")]
    pub steps: Vec<LeadStep>,
}

impl ForecastCycle {
    /// Fresh cycle: every step not ready, no clock.
    pub fn open(issue: IssueTime, policy: &ForcingPolicy, now: DateTime<Utc>) -> Self {
        Self {
            issue,
            opened_at: now,
            first_input_clock_time: None,
            first_pass_pending: true,
            steps: policy
                .steps
                .iter()
                .map(|offset| LeadStep::new(*offset, policy))
                .collect(),
        }
    }

    pub fn key(&self, step: &LeadStep) -> StepKey {
        StepKey {
            issue: self.issue,
            offset: step.offset,
        }
    }

    pub fn step(&self, offset: i32) -> Option<&LeadStep> {
        self.steps.iter().find(|s| s.offset == offset)
    }

    pub fn step_mut(&mut self, offset: i32) -> Option<&mut LeadStep> {
        self.steps.iter_mut().find(|s| s.offset == offset)
    }

    /// True if `step` is forced: either this is the cycle's first pass and
    /// the policy forces the step, or an earlier forced action is still to
    /// be retried.
    pub fn is_forced(&self, step: &LeadStep, policy: &ForcingPolicy) -> bool {
        step.forced || (self.first_pass_pending && policy.is_forced_on_first_pass(step.offset))
    }

    pub fn all_dispatched(&self) -> bool {
        self.steps.iter().all(|s| s.dispatched)
    }
}
