#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use forcewatch::config::{
    ActionSection, ConfigFile, ConfigSection, InputConfig, PolicySection, RawConfigFile,
    RegridSection, RegridSourceConfig, SourceConfig,
};
use forcewatch::probe::DEFAULT_SUFFIX;
use forcewatch::types::{ActionKind, FailurePolicy, StepMode};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    /// Empty config with default timing and a `full` action template.
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::new(state_file),
                policy: PolicySection::default(),
                source: BTreeMap::new(),
                action: ActionSection {
                    full: Some("layer {kind} {sources} {issue} {step}".to_string()),
                    ..ActionSection::default()
                },
                regrid: None,
            },
        }
    }

    /// Three-source analysis setup rooted at `root`:
    ///
    /// - `HRRR` (priority 1): `hrrr0` (0h) and `hrrr3` (3h from the run three
    ///   hours earlier)
    /// - `RAP` (priority 2): `rap0` and `rap3`, same convention
    /// - `MRMS` (priority 3): `mrms`
    ///
    /// Steps `[0]`, `hours_back` mode.
    pub fn analysis(root: impl AsRef<Path>, state_file: impl Into<PathBuf>) -> Self {
        let root = root.as_ref();
        Self::new(state_file)
            .policy_name("analysis_assim")
            .with_source(
                "HRRR",
                SourceBuilder::new(1)
                    .input("hrrr0", root.join("hrrr0"), 0, 0)
                    .input("hrrr3", root.join("hrrr3"), 3, 3)
                    .build(),
            )
            .with_source(
                "RAP",
                SourceBuilder::new(2)
                    .input("rap0", root.join("rap0"), 0, 0)
                    .input("rap3", root.join("rap3"), 3, 3)
                    .build(),
            )
            .with_source(
                "MRMS",
                SourceBuilder::new(3)
                    .input("mrms", root.join("mrms"), 0, 0)
                    .build(),
            )
    }

    /// Two-source short-range setup: `HRRR` (priority 1) and `RAP`
    /// (priority 2, passthrough), lead-hour steps `0..=steps`.
    pub fn short_range(root: impl AsRef<Path>, state_file: impl Into<PathBuf>, steps: i32) -> Self {
        let root = root.as_ref();
        Self::new(state_file)
            .policy_name("short_range")
            .step_mode(StepMode::LeadHour)
            .steps(&(0..=steps).collect::<Vec<_>>())
            .with_source(
                "HRRR",
                SourceBuilder::new(1)
                    .input("hrrr", root.join("hrrr"), 0, 0)
                    .build(),
            )
            .with_source(
                "RAP",
                SourceBuilder::new(2)
                    .passthrough()
                    .input("rap", root.join("rap"), 0, 0)
                    .build(),
            )
    }

    pub fn policy_name(mut self, name: &str) -> Self {
        self.config.policy.name = name.to_string();
        self
    }

    pub fn step_mode(mut self, mode: StepMode) -> Self {
        self.config.policy.step_mode = mode;
        self
    }

    pub fn steps(mut self, steps: &[i32]) -> Self {
        self.config.policy.steps = steps.to_vec();
        self
    }

    pub fn min_sources_for_partial(mut self, n: usize) -> Self {
        self.config.policy.min_sources_for_partial = n;
        self
    }

    pub fn force_on_first_pass(mut self, steps: &[i32]) -> Self {
        self.config.policy.force_on_first_pass = steps.to_vec();
        self
    }

    pub fn hours_back(mut self, hours: u32) -> Self {
        self.config.config.hours_back = hours;
        self
    }

    pub fn very_late_minutes(mut self, minutes: u64) -> Self {
        self.config.config.very_late_minutes = minutes;
        self
    }

    pub fn max_wait_minutes(mut self, minutes: u64) -> Self {
        self.config.config.max_wait_minutes = Some(minutes);
        self
    }

    pub fn lock_stale_minutes(mut self, minutes: u64) -> Self {
        self.config.config.lock_stale_minutes = minutes;
        self
    }

    pub fn action_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.config.action_timeout_seconds = seconds;
        self
    }

    pub fn on_action_failure(mut self, policy: FailurePolicy) -> Self {
        self.config.config.on_action_failure = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.config.max_attempts = n;
        self
    }

    pub fn with_source(mut self, name: &str, source: SourceConfig) -> Self {
        self.config.source.insert(name.to_string(), source);
        self
    }

    pub fn action(mut self, kind: ActionKind, template: &str) -> Self {
        let slot = match kind {
            ActionKind::Full => &mut self.config.action.full,
            ActionKind::DegradedTwoSource => &mut self.config.action.degraded_two_source,
            ActionKind::DegradedOneSource => &mut self.config.action.degraded_one_source,
            ActionKind::Passthrough => &mut self.config.action.passthrough,
            ActionKind::Regrid => &mut self.config.action.regrid,
        };
        *slot = Some(template.to_string());
        self
    }

    pub fn without_full_action(mut self) -> Self {
        self.config.action.full = None;
        self
    }

    pub fn regrid_backfill(mut self, backfill: bool) -> Self {
        self.config.regrid.get_or_insert_with(RegridSection::default).backfill = backfill;
        self
    }

    /// Add a regrid source; also sets `[action].regrid` if it is unset.
    pub fn with_regrid_source(mut self, name: &str, dir: impl Into<PathBuf>, hours_back: u32) -> Self {
        if self.config.action.regrid.is_none() {
            self.config.action.regrid = Some("regrid {file}".to_string());
        }
        self.config
            .regrid
            .get_or_insert_with(RegridSection::default)
            .source
            .insert(
                name.to_string(),
                RegridSourceConfig {
                    dir: dir.into(),
                    hours_back,
                    pattern: None,
                    command: None,
                },
            );
        self
    }

    pub fn regrid_pattern(mut self, name: &str, pattern: &str) -> Self {
        if let Some(src) = self
            .config
            .regrid
            .as_mut()
            .and_then(|r| r.source.get_mut(name))
        {
            src.pattern = Some(pattern.to_string());
        }
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `SourceConfig`.
pub struct SourceBuilder {
    source: SourceConfig,
}

impl SourceBuilder {
    pub fn new(priority: u32) -> Self {
        Self {
            source: SourceConfig {
                priority,
                passthrough: false,
                inputs: Vec::new(),
            },
        }
    }

    pub fn passthrough(mut self) -> Self {
        self.source.passthrough = true;
        self
    }

    pub fn input(mut self, name: &str, dir: impl Into<PathBuf>, lead_hour: i64, lag_hours: i64) -> Self {
        self.source.inputs.push(InputConfig {
            name: name.to_string(),
            dir: dir.into(),
            lead_hour,
            lag_hours,
            suffix: DEFAULT_SUFFIX.to_string(),
        });
        self
    }

    pub fn build(self) -> SourceConfig {
        self.source
    }
}
