//! Helpers for laying out forcing files on a `MockFileSystem`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use forcewatch::fs::mock::MockFileSystem;
use forcewatch::probe::{forcing_file_name, DEFAULT_SUFFIX};

/// `YYYYMMDDHHMM` or `YYYYMMDDHH` -> UTC timestamp.
pub fn utc(stamp: &str) -> DateTime<Utc> {
    let padded = match stamp.len() {
        10 => format!("{stamp}00"),
        _ => stamp.to_string(),
    };
    NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M")
        .expect("timestamp must be YYYYMMDDHH[MM]")
        .and_utc()
}

/// Path of the forcing file of run `issue` valid at `valid` under `root`.
pub fn forcing_path(root: &Path, issue: &str, valid: &str) -> PathBuf {
    root.join(issue)
        .join(forcing_file_name(&utc(valid), DEFAULT_SUFFIX))
}

/// Drop a forcing file into the mock tree.
pub fn put_forcing(fs: &MockFileSystem, root: &Path, issue: &str, valid: &str) -> PathBuf {
    let path = forcing_path(root, issue, valid);
    fs.add_file(&path, b"netcdf".to_vec());
    path
}
