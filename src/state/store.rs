// src/state/store.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::errors::{ForcewatchError, Result};
use crate::fs::FileSystem;
use crate::state::codec;
use crate::state::PersistedState;

/// Result of reading the state file.
#[derive(Debug)]
pub enum LoadedState {
    Existing(PersistedState),
    /// No state file: the tool has never run.
    Empty,
    /// The file could not be decoded and was moved aside.
    Quarantined { moved_to: PathBuf, reason: String },
}

impl LoadedState {
    pub fn into_state(self) -> PersistedState {
        match self {
            LoadedState::Existing(state) => state,
            LoadedState::Empty | LoadedState::Quarantined { .. } => PersistedState::empty(),
        }
    }
}

/// Reads and atomically replaces the state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl StateStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state file.
    ///
    /// A file that exists but cannot be read is an error. A file that reads
    /// but does not decode is renamed to `<path>.corrupt-<timestamp>` and the
    /// caller starts over from an empty state.
    pub fn load(&self, now: DateTime<Utc>) -> Result<LoadedState> {
        if !self.fs.exists(&self.path) {
            info!(path = ?self.path, "no state file yet, starting from empty state");
            return Ok(LoadedState::Empty);
        }

        let text = self.fs.read_to_string(&self.path).map_err(|e| {
            ForcewatchError::StateError(format!("reading {:?}: {e:#}", self.path))
        })?;
        match codec::decode(&text) {
            Ok(state) => {
                debug!(path = ?self.path, cycles = state.cycles.len(), "loaded state");
                Ok(LoadedState::Existing(state))
            }
            Err(err) => {
                let moved_to = suffixed(&self.path, &format!(".corrupt-{}", now.format("%Y%m%dT%H%M%S")));
                self.fs.rename(&self.path, &moved_to)?;
                error!(
                    path = ?self.path,
                    moved_to = ?moved_to,
                    error = %err,
                    "state file is malformed; moved aside and starting from empty state"
                );
                Ok(LoadedState::Quarantined {
                    moved_to,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Read the state without side effects. An undecodable file reads as
    /// empty and stays where it is.
    pub fn peek(&self) -> Result<PersistedState> {
        if !self.fs.exists(&self.path) {
            return Ok(PersistedState::empty());
        }
        let text = self.fs.read_to_string(&self.path)?;
        Ok(codec::decode(&text).unwrap_or_else(|err| {
            debug!(path = ?self.path, error = %err, "state file does not decode; previewing from empty state");
            PersistedState::empty()
        }))
    }

    /// Write the whole state to a temp file next to the target and rename it
    /// into place.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let text = codec::encode(state)?;
        let tmp = suffixed(&self.path, &format!(".tmp.{}", std::process::id()));

        self.fs.write(&tmp, text.as_bytes())?;
        if let Err(err) = self.fs.rename(&tmp, &self.path) {
            let _ = self.fs.remove_file(&tmp);
            return Err(err.into());
        }
        debug!(path = ?self.path, bytes = text.len(), "saved state");
        Ok(())
    }
}

pub(crate) fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
