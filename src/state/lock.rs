// src/state/lock.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::errors::{ForcewatchError, Result};
use crate::fs::FileSystem;

/// Exclusive hold on the run. Released when dropped, unless another run has
/// taken the file over in the meantime.
#[derive(Debug)]
pub struct StateLock {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    /// What this run last wrote into the lock file.
    content: String,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if self.is_held() {
            let _ = self.fs.remove_file(&self.path);
        } else {
            warn!(path = ?self.path, "run lock changed hands; leaving it in place");
        }
    }
}

impl StateLock {
    /// Try to take the lock at `path`.
    ///
    /// Returns `Ok(None)` when another run holds it. A lock whose recorded
    /// timestamp is at least `stale_after` old is reaped and retaken; a zero
    /// `stale_after` disables reaping.
    pub fn try_acquire(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        stale_after: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<Option<StateLock>> {
        let path = path.into();
        let content = lock_file_content(now);

        if fs.create_new(&path, content.as_bytes())? {
            debug!(path = ?path, "acquired run lock");
            return Ok(Some(StateLock { fs, path, content }));
        }

        if stale_after.is_zero() || !is_lock_stale(fs.as_ref(), &path, stale_after, now)? {
            return Ok(None);
        }

        warn!(path = ?path, "reaping stale run lock");
        let _ = fs.remove_file(&path);
        if fs.create_new(&path, content.as_bytes())? {
            Ok(Some(StateLock { fs, path, content }))
        } else {
            Ok(None)
        }
    }

    /// The lock file still holds what this run last wrote.
    pub fn is_held(&self) -> bool {
        self.fs
            .read_to_string(&self.path)
            .is_ok_and(|c| c == self.content)
    }

    /// Re-stamp the lock with `now`. Fails if the lock is no longer ours.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_held() {
            return Err(ForcewatchError::StateError(format!(
                "run lock {} was taken over by another run",
                self.path.display()
            )));
        }
        let content = lock_file_content(now);
        self.fs.write(&self.path, content.as_bytes())?;
        self.content = content;
        Ok(())
    }
}

fn lock_file_content(now: DateTime<Utc>) -> String {
    format!(
        "unix_time_ms={}\npid={}\n",
        now.timestamp_millis(),
        std::process::id()
    )
}

fn is_lock_stale(
    fs: &dyn FileSystem,
    path: &Path,
    stale_after: TimeDelta,
    now: DateTime<Utc>,
) -> Result<bool> {
    if !fs.exists(path) {
        return Ok(false);
    }
    let content = fs.read_to_string(path)?;

    let lock_ms = content.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        if k.trim() == "unix_time_ms" {
            v.trim().parse::<i64>().ok()
        } else {
            None
        }
    });

    let Some(lock_ms) = lock_ms else {
        return Ok(false);
    };

    let age_ms = now.timestamp_millis().saturating_sub(lock_ms);
    Ok(age_ms >= stale_after.num_milliseconds())
}
