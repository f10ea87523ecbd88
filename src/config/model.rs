// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::probe::DEFAULT_SUFFIX;
use crate::types::{FailurePolicy, StepMode};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// state_file = "state/analysis_assim.state"
/// hours_back = 5
/// very_late_minutes = 20
///
/// [policy]
/// name = "analysis_assim"
/// step_mode = "hours_back"
/// steps = [0, -1, -2]
///
/// [source.HRRR]
/// priority = 1
/// input = [
///   { name = "hrrr0", dir = "/data/hrrr_0hr", lead_hour = 0 },
///   { name = "hrrr3", dir = "/data/hrrr", lead_hour = 3, lag_hours = 3 },
/// ]
///
/// [action]
/// full = "layer.sh {sources} {issue} {step}"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global run settings from `[config]`.
    pub config: ConfigSection,

    /// The readiness policy from `[policy]`.
    #[serde(default)]
    pub policy: PolicySection,

    /// Data sources from `[source.<name>]`, keyed by source name.
    #[serde(default)]
    pub source: BTreeMap<String, SourceConfig>,

    /// External command templates from `[action]`.
    #[serde(default)]
    pub action: ActionSection,

    /// Optional regrid ledger from `[regrid]`.
    #[serde(default)]
    pub regrid: Option<RegridSection>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on the invariants checked there.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub policy: PolicySection,
    pub source: BTreeMap<String, SourceConfig>,
    pub action: ActionSection,
    pub regrid: Option<RegridSection>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            policy: raw.policy,
            source: raw.source,
            action: raw.action,
            regrid: raw.regrid,
        }
    }

    /// Path of the run lock (defaults to `<state_file>.lock`).
    pub fn lock_file(&self) -> PathBuf {
        self.config.lock_file.clone().unwrap_or_else(|| {
            let mut name = self.config.state_file.as_os_str().to_owned();
            name.push(".lock");
            PathBuf::from(name)
        })
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Where the persisted tracker state lives. Its directory must exist.
    pub state_file: PathBuf,

    /// Override for the lock file path.
    #[serde(default)]
    pub lock_file: Option<PathBuf>,

    /// A lock older than this is considered abandoned and is reaped.
    #[serde(default = "default_lock_stale_minutes")]
    pub lock_stale_minutes: u64,

    /// Cycles older than `newest - hours_back` are pruned.
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,

    /// Minutes after the first input of a cycle arrived before its steps
    /// are considered timed out.
    #[serde(default = "default_very_late_minutes")]
    pub very_late_minutes: u64,

    /// Optional: minutes a partially ready step waits after its own first
    /// input before it is escalated.
    #[serde(default)]
    pub max_wait_minutes: Option<u64>,

    /// Upper bound on a single external action.
    #[serde(default = "default_action_timeout_seconds")]
    pub action_timeout_seconds: u64,

    /// `"retry"` (default) or `"mark_done"`.
    #[serde(default)]
    pub on_action_failure: FailurePolicy,

    /// Maximum invocations per step under the retry policy.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_lock_stale_minutes() -> u64 {
    60
}

fn default_hours_back() -> u32 {
    5
}

fn default_very_late_minutes() -> u64 {
    20
}

fn default_action_timeout_seconds() -> u64 {
    1800
}

fn default_max_attempts() -> u32 {
    3
}

impl ConfigSection {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            lock_file: None,
            lock_stale_minutes: default_lock_stale_minutes(),
            hours_back: default_hours_back(),
            very_late_minutes: default_very_late_minutes(),
            max_wait_minutes: None,
            action_timeout_seconds: default_action_timeout_seconds(),
            on_action_failure: FailurePolicy::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// `[policy]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySection {
    /// Label used in logs (e.g. `"short_range"`, `"analysis_assim"`).
    #[serde(default = "default_policy_name")]
    pub name: String,

    /// `"hours_back"` (default) or `"lead_hour"`.
    #[serde(default)]
    pub step_mode: StepMode,

    /// Step offsets tracked for every cycle.
    #[serde(default = "default_steps")]
    pub steps: Vec<i32>,

    /// Complete sources needed before a step counts as partially ready.
    #[serde(default = "default_min_sources_for_partial")]
    pub min_sources_for_partial: usize,

    /// Steps dispatched with whatever is available on a cycle's first pass.
    #[serde(default)]
    pub force_on_first_pass: Vec<i32>,
}

fn default_policy_name() -> String {
    "layering".to_string()
}

fn default_steps() -> Vec<i32> {
    vec![0]
}

fn default_min_sources_for_partial() -> usize {
    1
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            name: default_policy_name(),
            step_mode: StepMode::default(),
            steps: default_steps(),
            min_sources_for_partial: default_min_sources_for_partial(),
            force_on_first_pass: Vec::new(),
        }
    }
}

/// `[source.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Lower is preferred when choosing a degraded variant.
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// When this is the only complete source, copy it through unmodified
    /// instead of running a one-source layering.
    #[serde(default)]
    pub passthrough: bool,

    /// Files that must all be present for the source to count as complete.
    #[serde(default, rename = "input")]
    pub inputs: Vec<InputConfig>,
}

fn default_priority() -> u32 {
    100
}

/// One required file per step, part of a source.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Unique name, used as the availability key in the state file.
    pub name: String,

    /// Root directory holding `YYYYMMDDHH` issue subdirectories.
    pub dir: PathBuf,

    /// Forecast hour of the file within its run.
    #[serde(default)]
    pub lead_hour: i64,

    /// Hours between the producing run and the step's issue time.
    #[serde(default)]
    pub lag_hours: i64,

    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

/// `[action]` section: command templates per action kind.
///
/// Templates may use `{kind}`, `{policy}`, `{issue}`, `{step}`, `{valid}`,
/// `{sources}`, `{files}` and `{file}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActionSection {
    #[serde(default)]
    pub full: Option<String>,
    #[serde(default)]
    pub degraded_two_source: Option<String>,
    #[serde(default)]
    pub degraded_one_source: Option<String>,
    #[serde(default)]
    pub passthrough: Option<String>,
    #[serde(default)]
    pub regrid: Option<String>,
}

/// `[regrid]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegridSection {
    /// Regrid files already on disk the first time a source is seen,
    /// instead of only recording them.
    #[serde(default)]
    pub backfill: bool,

    #[serde(default)]
    pub source: BTreeMap<String, RegridSourceConfig>,
}

/// `[regrid.source.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RegridSourceConfig {
    pub dir: PathBuf,

    /// Issue directories older than `newest - hours_back` are ignored.
    #[serde(default = "default_regrid_hours_back")]
    pub hours_back: u32,

    /// Regex a file name must match to be regridded.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Per-source command, overriding `[action].regrid`.
    #[serde(default)]
    pub command: Option<String>,
}

fn default_regrid_hours_back() -> u32 {
    3
}
