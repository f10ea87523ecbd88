// src/tracker/policy.rs

//! Per-configuration policy descriptor.
//!
//! One descriptor replaces what used to be a hand-copied driver per forcing
//! configuration: it names the sources, their input files and priorities,
//! the step convention and the partial/forced thresholds.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::ConfigFile;
use crate::probe::{forcing_file_name, issue_dir};
use crate::types::{IssueTime, StepMode};

/// One required file per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub dir: PathBuf,
    pub lead_hour: i64,
    pub lag_hours: i64,
    pub suffix: String,
}

/// A data source and the inputs that make it complete for a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub priority: u32,
    pub passthrough: bool,
    pub inputs: Vec<InputSpec>,
}

/// Where a given input of a given step is expected on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFile {
    pub root: PathBuf,
    pub issue: IssueTime,
    pub valid: DateTime<Utc>,
    pub file_name: String,
}

impl ExpectedFile {
    pub fn path(&self) -> PathBuf {
        issue_dir(&self.root, self.issue).join(&self.file_name)
    }
}

#[derive(Debug, Clone)]
pub struct ForcingPolicy {
    pub name: String,
    pub step_mode: StepMode,
    pub steps: Vec<i32>,
    /// Sorted by `(priority, name)`: most preferred first.
    pub sources: Vec<SourceSpec>,
    pub min_sources_for_partial: usize,
    pub force_on_first_pass: Vec<i32>,
}

impl ForcingPolicy {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut sources: Vec<SourceSpec> = cfg
            .source
            .iter()
            .map(|(name, src)| SourceSpec {
                name: name.clone(),
                priority: src.priority,
                passthrough: src.passthrough,
                inputs: src
                    .inputs
                    .iter()
                    .map(|i| InputSpec {
                        name: i.name.clone(),
                        dir: i.dir.clone(),
                        lead_hour: i.lead_hour,
                        lag_hours: i.lag_hours,
                        suffix: i.suffix.clone(),
                    })
                    .collect(),
            })
            .collect();
        sources.sort_by(|a, b| (a.priority, &a.name).cmp(&(b.priority, &b.name)));

        Self {
            name: cfg.policy.name.clone(),
            step_mode: cfg.policy.step_mode,
            steps: cfg.policy.steps.clone(),
            sources,
            min_sources_for_partial: cfg.policy.min_sources_for_partial,
            force_on_first_pass: cfg.policy.force_on_first_pass.clone(),
        }
    }

    pub fn inputs(&self) -> impl Iterator<Item = &InputSpec> {
        self.sources.iter().flat_map(|s| s.inputs.iter())
    }

    /// Distinct root directories of all inputs, in first-seen order.
    pub fn input_roots(&self) -> Vec<&Path> {
        let mut roots: Vec<&Path> = Vec::new();
        for input in self.inputs() {
            if !roots.contains(&input.dir.as_path()) {
                roots.push(input.dir.as_path());
            }
        }
        roots
    }

    pub fn source(&self, name: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn is_forced_on_first_pass(&self, offset: i32) -> bool {
        self.force_on_first_pass.contains(&offset)
    }

    /// Valid time of the layered product for a step.
    pub fn step_valid_time(&self, cycle_issue: IssueTime, offset: i32) -> DateTime<Utc> {
        cycle_issue.as_datetime() + TimeDelta::hours(offset as i64)
    }

    /// Derive the expected file of `input` for the step at `offset` of the
    /// cycle issued at `cycle_issue`.
    pub fn expected_file(&self, input: &InputSpec, cycle_issue: IssueTime, offset: i32) -> ExpectedFile {
        let offset = offset as i64;
        let (issue, valid_shift) = match self.step_mode {
            StepMode::HoursBack => (cycle_issue.plus_hours(offset - input.lag_hours), 0),
            StepMode::LeadHour => (cycle_issue.plus_hours(-input.lag_hours), offset),
        };
        let valid = issue.as_datetime() + TimeDelta::hours(input.lead_hour + valid_shift);
        ExpectedFile {
            root: input.dir.clone(),
            issue,
            valid,
            file_name: forcing_file_name(&valid, &input.suffix),
        }
    }
}
