// src/regrid/mod.rs

//! Regrid ledger.
//!
//! Raw model output lands in `<dir>/<YYYYMMDDHH>/`. Every file that shows up
//! within the source's horizon is handed to the regrid action once. The
//! ledger remembers which ones were already handed off.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigFile;
use crate::dispatch::FailureHandling;
use crate::errors::config_error;
use crate::probe::{issue_dir, AvailabilityProbe};
use crate::types::{FailurePolicy, IssueTime};

/// Per-source record of files already handed to the regrid action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegridLedger {
    /// `YYYYMMDDHH/<file>` entries.
    #[serde(default)]
    pub seen: BTreeSet<String>,

    /// Failed invocations for entries not yet in `seen`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attempts: BTreeMap<String, u32>,
}

impl RegridLedger {
    pub fn is_seen(&self, entry: &str) -> bool {
        self.seen.contains(entry)
    }

    pub fn mark_seen(&mut self, entry: &str) {
        self.attempts.remove(entry);
        self.seen.insert(entry.to_string());
    }

    /// Record a failed regrid. Returns true if the file will be tried again
    /// on a later pass.
    pub fn record_failure(&mut self, entry: &str, handling: &FailureHandling) -> bool {
        let attempts = self.attempts.entry(entry.to_string()).or_insert(0);
        *attempts += 1;
        let will_retry =
            handling.policy == FailurePolicy::Retry && *attempts < handling.max_attempts;
        if !will_retry {
            self.mark_seen(entry);
        }
        will_retry
    }

    /// Forget entries whose issue time is older than `horizon`.
    pub fn prune_before(&mut self, horizon: IssueTime) -> usize {
        let keep = |entry: &String| entry_issue(entry).is_some_and(|t| t >= horizon);
        let before = self.seen.len() + self.attempts.len();
        self.seen.retain(keep);
        self.attempts.retain(|k, _| keep(k));
        before - (self.seen.len() + self.attempts.len())
    }
}

fn entry_issue(entry: &str) -> Option<IssueTime> {
    let (dir, _) = entry.split_once('/')?;
    IssueTime::parse(dir)
}

/// One `[regrid.source.<name>]` after validation.
#[derive(Debug, Clone)]
pub struct RegridSource {
    pub name: String,
    pub dir: PathBuf,
    pub hours_back: u32,
    pub pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct RegridSpec {
    pub backfill: bool,
    pub sources: Vec<RegridSource>,
}

impl RegridSpec {
    pub fn from_config(cfg: &ConfigFile) -> crate::errors::Result<Option<Self>> {
        let Some(section) = cfg.regrid.as_ref() else {
            return Ok(None);
        };

        let mut sources = Vec::with_capacity(section.source.len());
        for (name, src) in section.source.iter() {
            let pattern = match src.pattern.as_deref() {
                Some(p) => Some(Regex::new(p).map_err(|e| {
                    config_error(format!("regrid source '{name}' has invalid pattern: {e}"))
                })?),
                None => None,
            };
            sources.push(RegridSource {
                name: name.clone(),
                dir: src.dir.clone(),
                hours_back: src.hours_back,
                pattern,
            });
        }

        Ok(Some(Self {
            backfill: section.backfill,
            sources,
        }))
    }
}

/// A raw file eligible for regridding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub issue: IssueTime,
    pub file_name: String,
    pub path: PathBuf,
}

impl Candidate {
    /// Ledger key.
    pub fn entry(&self) -> String {
        format!("{}/{}", self.issue, self.file_name)
    }
}

/// What is currently on disk for one regrid source.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Oldest issue time still inside the horizon; `None` if the source
    /// directory has no issue subdirectories.
    pub horizon: Option<IssueTime>,
    pub candidates: Vec<Candidate>,
}

/// List the files of `source` within `hours_back` of its newest issue time.
pub fn scan(source: &RegridSource, probe: &dyn AvailabilityProbe) -> Result<Scan> {
    let mut issues = probe.issue_times(&source.dir)?;
    issues.sort();
    let Some(newest) = issues.last().copied() else {
        return Ok(Scan::default());
    };
    let horizon = newest.plus_hours(-(source.hours_back as i64));

    let mut candidates = Vec::new();
    for issue in issues.into_iter().filter(|t| *t >= horizon) {
        for file_name in probe.files_in(&source.dir, issue)? {
            if source
                .pattern
                .as_ref()
                .is_some_and(|re| !re.is_match(&file_name))
            {
                continue;
            }
            let path = issue_dir(&source.dir, issue).join(&file_name);
            candidates.push(Candidate {
                issue,
                file_name,
                path,
            });
        }
    }

    Ok(Scan {
        horizon: Some(horizon),
        candidates,
    })
}
