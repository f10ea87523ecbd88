// src/state/mod.rs

//! Persisted tracker state.
//!
//! - `codec`: TOML body plus a trailing blake3 checksum line.
//! - `store`: load (with quarantine of malformed files) and atomic save.
//! - `lock`: the run lock that keeps two passes from racing on the file.

pub mod codec;
pub mod lock;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::regrid::RegridLedger;
use crate::tracker::{ForcingPolicy, ForecastCycle};
use crate::types::IssueTime;

pub use codec::{decode, encode, DecodeError, STATE_VERSION};
pub use lock::StateLock;
pub use store::{LoadedState, StateStore};

/// Everything one pass hands to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,

    /// True until the first cycle has been opened.
    #[serde(default)]
    pub first_run: bool,

    /// Tracked cycles, oldest first. The last one is current.
    #[serde(default, rename = "cycle", skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<ForecastCycle>,

    /// Regrid ledgers keyed by regrid source name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regrid: BTreeMap<String, RegridLedger>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::empty()
    }
}

/// What [`PersistedState::reinitialize_if_new_cycle`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleChange {
    pub opened: Option<IssueTime>,
    pub pruned: Vec<IssueTime>,
}

impl PersistedState {
    /// State of a tool that has never run.
    pub fn empty() -> Self {
        Self {
            version: STATE_VERSION,
            first_run: true,
            cycles: Vec::new(),
            regrid: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn current(&self) -> Option<&ForecastCycle> {
        self.cycles.last()
    }

    pub fn cycle(&self, issue: IssueTime) -> Option<&ForecastCycle> {
        self.cycles.iter().find(|c| c.issue == issue)
    }

    pub fn cycle_mut(&mut self, issue: IssueTime) -> Option<&mut ForecastCycle> {
        self.cycles.iter_mut().find(|c| c.issue == issue)
    }

    /// Open a cycle for `newest` if it is strictly newer than the current
    /// one (or nothing is tracked yet), then drop cycles that fell out of
    /// the `hours_back` horizon.
    ///
    /// An equal or older `newest` changes nothing.
    pub fn reinitialize_if_new_cycle(
        &mut self,
        newest: IssueTime,
        hours_back: u32,
        policy: &ForcingPolicy,
        now: DateTime<Utc>,
    ) -> CycleChange {
        let mut change = CycleChange::default();
        if self.current().is_some_and(|c| c.issue >= newest) {
            return change;
        }

        self.cycles.push(ForecastCycle::open(newest, policy, now));
        self.cycles.sort_by_key(|c| c.issue);
        self.first_run = false;
        change.opened = Some(newest);

        let horizon = newest.plus_hours(-(hours_back as i64));
        self.cycles.retain(|c| {
            let keep = c.issue >= horizon;
            if !keep {
                change.pruned.push(c.issue);
            }
            keep
        });
        change
    }
}
