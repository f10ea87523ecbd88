// src/tracker/readiness.rs

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::ConfigSection;
use crate::probe::AvailabilityProbe;
use crate::tracker::cycle::{ForecastCycle, LeadStep};
use crate::tracker::policy::{ForcingPolicy, SourceSpec};
use crate::types::{ActionKind, IssueTime};

/// Readiness of one step at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readiness {
    NotReady,
    PartiallyReady,
    FullyReady,
    TimedOut,
}

impl Readiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::NotReady => "not_ready",
            Readiness::PartiallyReady => "partially_ready",
            Readiness::FullyReady => "fully_ready",
            Readiness::TimedOut => "timed_out",
        }
    }
}

/// Timeout knobs, taken from `[config]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub very_late: TimeDelta,
    pub max_wait: Option<TimeDelta>,
    pub hours_back: u32,
}

impl Timing {
    pub fn from_config(cfg: &ConfigSection) -> Self {
        Self {
            very_late: minutes(cfg.very_late_minutes),
            max_wait: cfg.max_wait_minutes.map(minutes),
            hours_back: cfg.hours_back,
        }
    }
}

/// Minutes as a `TimeDelta`, saturating at `TimeDelta::MAX`.
pub(crate) fn minutes(m: u64) -> TimeDelta {
    i64::try_from(m)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .unwrap_or(TimeDelta::MAX)
}

/// What one refresh of one step found.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Inputs that flipped to available on this pass.
    pub arrived: Vec<String>,
    /// `(input name, error)` for inputs whose probe failed.
    pub probe_failures: Vec<(String, String)>,
    /// The step went from nothing to something on this pass.
    pub step_clock_started: bool,
}

/// Re-probe every input of `step` that is not yet available.
///
/// Flags only ever go from false to true. A dispatched step is left alone.
/// Probe errors are reported and the input stays unavailable for this pass.
pub fn refresh_availability(
    cycle_issue: IssueTime,
    step: &mut LeadStep,
    policy: &ForcingPolicy,
    probe: &dyn AvailabilityProbe,
    now: DateTime<Utc>,
) -> RefreshReport {
    let mut report = RefreshReport::default();
    if step.dispatched {
        return report;
    }

    let had_any = step.has_any_input();
    for input in policy.inputs() {
        if step.is_available(&input.name) {
            continue;
        }
        let expected = policy.expected_file(input, cycle_issue, step.offset);
        match probe.file_exists(&expected.root, expected.issue, &expected.file_name) {
            Ok(true) => {
                if step.mark_available(&input.name) {
                    report.arrived.push(input.name.clone());
                }
            }
            Ok(false) => {}
            Err(err) => report
                .probe_failures
                .push((input.name.clone(), format!("{err:#}"))),
        }
    }

    if !had_any && step.has_any_input() {
        step.first_seen_at.get_or_insert(now);
        report.step_clock_started = true;
    }
    report
}

/// Start the cycle clock if any step has seen an input. Returns true if the
/// clock was started now.
pub fn start_cycle_clock(cycle: &mut ForecastCycle, now: DateTime<Utc>) -> bool {
    if cycle.first_input_clock_time.is_some() {
        return false;
    }
    if cycle.steps.iter().any(LeadStep::has_any_input) {
        cycle.first_input_clock_time = Some(now);
        return true;
    }
    false
}

pub fn source_complete(step: &LeadStep, source: &SourceSpec) -> bool {
    source.inputs.iter().all(|i| step.is_available(&i.name))
}

/// Complete sources in preference order.
pub fn complete_sources<'p>(step: &LeadStep, policy: &'p ForcingPolicy) -> Vec<&'p SourceSpec> {
    policy
        .sources
        .iter()
        .filter(|s| source_complete(step, s))
        .collect()
}

/// Names of sources that are not complete, in preference order.
pub fn missing_sources(step: &LeadStep, policy: &ForcingPolicy) -> Vec<String> {
    policy
        .sources
        .iter()
        .filter(|s| !source_complete(step, s))
        .map(|s| s.name.clone())
        .collect()
}

pub fn classify(
    cycle: &ForecastCycle,
    step: &LeadStep,
    policy: &ForcingPolicy,
    timing: &Timing,
    now: DateTime<Utc>,
) -> Readiness {
    let complete = complete_sources(step, policy).len();
    if complete == policy.sources.len() {
        return Readiness::FullyReady;
    }

    let partial = complete >= policy.min_sources_for_partial;

    // The cycle clock never times out a step that has seen nothing.
    let very_late = step.has_any_input()
        && cycle
            .first_input_clock_time
            .is_some_and(|t| now - t > timing.very_late);
    let waited_out = match (timing.max_wait, step.first_seen_at) {
        (Some(max_wait), Some(seen)) => partial && now - seen > max_wait,
        _ => false,
    };
    if very_late || waited_out {
        return Readiness::TimedOut;
    }

    if partial {
        Readiness::PartiallyReady
    } else {
        Readiness::NotReady
    }
}

/// A cycle that has not seen a single input for longer than `very_late`.
pub fn inputs_very_late(cycle: &ForecastCycle, timing: &Timing, now: DateTime<Utc>) -> bool {
    cycle.first_input_clock_time.is_none() && now - cycle.opened_at > timing.very_late
}

/// An action variant together with the sources it combines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub kind: ActionKind,
    pub sources: Vec<String>,
}

/// Best action the currently complete sources allow.
///
/// More complete sources beat fewer; among equals, priority decides.
pub fn best_variant(step: &LeadStep, policy: &ForcingPolicy) -> Option<Variant> {
    let complete = complete_sources(step, policy);
    let names = |n: usize| -> Vec<String> { complete.iter().take(n).map(|s| s.name.clone()).collect() };

    match complete.len() {
        0 => None,
        n if n == policy.sources.len() => Some(Variant {
            kind: ActionKind::Full,
            sources: names(n),
        }),
        1 => {
            let kind = if complete[0].passthrough {
                ActionKind::Passthrough
            } else {
                ActionKind::DegradedOneSource
            };
            Some(Variant {
                kind,
                sources: names(1),
            })
        }
        _ => Some(Variant {
            kind: ActionKind::DegradedTwoSource,
            sources: names(2),
        }),
    }
}
