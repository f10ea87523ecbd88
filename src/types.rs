// src/types.rs

//! Small value types shared across the crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Model issue time ("cycle"), hour resolution, UTC.
///
/// The textual form `YYYYMMDDHH` is also the name of the per-issue
/// subdirectory that model output is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssueTime(DateTime<Utc>);

impl IssueTime {
    /// `strftime` layout of issue-time directory names.
    pub const DIR_FORMAT: &'static str = "%Y%m%d%H";

    /// Parse a `YYYYMMDDHH` name. Anything else (wrong length, non-digits,
    /// impossible dates) yields `None`.
    pub fn parse(name: &str) -> Option<Self> {
        if name.len() != 10 || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let date = NaiveDate::parse_from_str(&name[..8], "%Y%m%d").ok()?;
        let hour: u32 = name[8..].parse().ok()?;
        let naive = date.and_hms_opt(hour, 0, 0)?;
        Some(IssueTime(naive.and_utc()))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Directory name for this issue time (`YYYYMMDDHH`).
    pub fn dir_name(&self) -> String {
        self.0.format(Self::DIR_FORMAT).to_string()
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        IssueTime(self.0 + TimeDelta::hours(hours))
    }
}

impl fmt::Display for IssueTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

impl FromStr for IssueTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueTime::parse(s.trim())
            .ok_or_else(|| format!("invalid issue time: {s:?} (expected YYYYMMDDHH)"))
    }
}

impl Serialize for IssueTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.dir_name())
    }
}

impl<'de> Deserialize<'de> for IssueTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Format a valid time the way forcing file names spell it (`YYYYMMDDHHMM`).
pub fn valid_time_stamp(valid: &DateTime<Utc>) -> String {
    valid.format("%Y%m%d%H%M").to_string()
}

/// Which downstream action variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// All sources combined.
    Full,
    /// Two sources layered, at least one missing.
    DegradedTwoSource,
    /// A single source run through the layering step on its own.
    DegradedOneSource,
    /// A single source copied unmodified in place of a layered product.
    Passthrough,
    /// Regrid/downscale of one newly arrived raw file.
    Regrid,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Full => "FULL",
            ActionKind::DegradedTwoSource => "DEGRADED_TWO_SOURCE",
            ActionKind::DegradedOneSource => "DEGRADED_ONE_SOURCE",
            ActionKind::Passthrough => "PASSTHROUGH",
            ActionKind::Regrid => "REGRID",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            ActionKind::DegradedTwoSource | ActionKind::DegradedOneSource | ActionKind::Passthrough
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a step whose external action reported failure.
///
/// - `Retry`: leave the step undispatched so the next run tries again, up to
///   `max_attempts` invocations; then flag it for manual attention.
/// - `MarkDone`: treat the step as dispatched regardless of the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Retry,
    MarkDone,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retry" => Ok(FailurePolicy::Retry),
            "mark_done" | "mark-done" => Ok(FailurePolicy::MarkDone),
            other => Err(format!(
                "invalid on_action_failure: {other} (expected \"retry\" or \"mark_done\")"
            )),
        }
    }
}

/// How a step offset maps onto input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Offset shifts the issue time of the inputs (analysis/assimilation:
    /// steps `0, -1, -2`).
    #[default]
    HoursBack,
    /// Offset is a lead hour within the cycle (short/medium range).
    LeadHour,
}
