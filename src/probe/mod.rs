// src/probe/mod.rs

//! Filesystem probe.
//!
//! The probe is the only way the tool senses the outside world: it reports
//! which issue-time directories exist under a watched root and whether a
//! given file is present. No file content is ever read.

pub mod naming;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::types::IssueTime;

pub use naming::{forcing_file_name, issue_dir, DEFAULT_SUFFIX};

/// Read-only view of the watched directories.
pub trait AvailabilityProbe: Send + Sync {
    /// All `YYYYMMDDHH` subdirectories of `root` (unsorted).
    fn issue_times(&self, root: &Path) -> Result<Vec<IssueTime>>;

    /// Whether `<root>/<issue>/<file_name>` exists as a file.
    ///
    /// A missing issue directory is not an error; it simply means the file
    /// has not arrived yet.
    fn file_exists(&self, root: &Path, issue: IssueTime, file_name: &str) -> Result<bool>;

    /// Names of the plain files directly inside `<root>/<issue>/`.
    fn files_in(&self, root: &Path, issue: IssueTime) -> Result<Vec<String>>;

    /// Newest issue time under `root`, or `None` if there is none.
    fn newest_issue_time(&self, root: &Path) -> Result<Option<IssueTime>> {
        Ok(self.issue_times(root)?.into_iter().max())
    }
}

/// Probe backed by a [`FileSystem`].
#[derive(Debug, Clone)]
pub struct FsProbe {
    fs: Arc<dyn FileSystem>,
}

impl FsProbe {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl AvailabilityProbe for FsProbe {
    fn issue_times(&self, root: &Path) -> Result<Vec<IssueTime>> {
        let mut times = Vec::new();
        for entry in self.fs.read_dir(root)? {
            if !self.fs.is_dir(&entry) {
                continue;
            }
            if let Some(issue) = naming::issue_time_of(&entry) {
                times.push(issue);
            }
        }
        Ok(times)
    }

    fn file_exists(&self, root: &Path, issue: IssueTime, file_name: &str) -> Result<bool> {
        let dir = issue_dir(root, issue);
        if !self.fs.is_dir(&dir) {
            return Ok(false);
        }
        let wanted = dir.join(file_name);
        let found = self
            .fs
            .read_dir(&dir)?
            .iter()
            .any(|p| p == &wanted && self.fs.is_file(p));
        if found {
            debug!(file = %file_name, dir = ?dir, "found input file");
        }
        Ok(found)
    }

    fn files_in(&self, root: &Path, issue: IssueTime) -> Result<Vec<String>> {
        let dir = issue_dir(root, issue);
        let mut names = Vec::new();
        for entry in self.fs.read_dir(&dir)? {
            if !self.fs.is_file(&entry) {
                continue;
            }
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Newest issue time across several roots, taking the maximum.
///
/// Roots that cannot be listed are returned alongside so the caller can
/// report them; they simply do not contribute to the maximum.
pub fn newest_across<'a, I>(
    probe: &dyn AvailabilityProbe,
    roots: I,
) -> (Option<IssueTime>, Vec<(PathBuf, anyhow::Error)>)
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut newest: Option<IssueTime> = None;
    let mut failures = Vec::new();

    for root in roots {
        match probe.newest_issue_time(root) {
            Ok(Some(t)) => {
                newest = Some(newest.map_or(t, |n| n.max(t)));
            }
            Ok(None) => {}
            Err(err) => failures.push((root.to_path_buf(), err)),
        }
    }

    (newest, failures)
}
