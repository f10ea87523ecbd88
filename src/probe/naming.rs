// src/probe/naming.rs

//! On-disk naming conventions for forcing data.
//!
//! Model output lives at `<root>/<YYYYMMDDHH>/<YYYYMMDDHHMM><suffix>`, where
//! the directory is the issue time of the producing run and the file name is
//! the valid time of the field.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::types::{valid_time_stamp, IssueTime};

/// Suffix used by the regridded/downscaled forcing products.
pub const DEFAULT_SUFFIX: &str = ".LDASIN_DOMAIN1.nc";

/// File name for a forcing field valid at `valid`.
pub fn forcing_file_name(valid: &DateTime<Utc>, suffix: &str) -> String {
    format!("{}{}", valid_time_stamp(valid), suffix)
}

/// Directory holding the output of the run issued at `issue`.
pub fn issue_dir(root: &Path, issue: IssueTime) -> PathBuf {
    root.join(issue.dir_name())
}

/// Issue time encoded in a directory entry's final component, if any.
pub fn issue_time_of(path: &Path) -> Option<IssueTime> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(IssueTime::parse)
}
