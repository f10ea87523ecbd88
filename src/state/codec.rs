// src/state/codec.rs

//! On-disk encoding of [`PersistedState`].
//!
//! The file is a TOML document followed by one comment line carrying a blake3
//! hash of everything above it:
//!
//! ```text
//! # forcewatch state
//! version = 1
//! first_run = false
//!
//! [[cycle]]
//! issue = "2024010100"
//! ...
//! # checksum = blake3:9f2c...
//! ```

use serde::Deserialize;
use thiserror::Error;

use crate::errors::Result;
use crate::state::PersistedState;

pub const STATE_VERSION: u32 = 1;

const HEADER: &str = "# forcewatch state\n";
const CHECKSUM_PREFIX: &str = "# checksum = blake3:";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing checksum line")]
    MissingChecksum,

    #[error("checksum mismatch: file says {expected}, content hashes to {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("invalid state TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported state version {0} (this build reads version {STATE_VERSION})")]
    UnsupportedVersion(u32),
}

#[derive(Deserialize)]
struct VersionOnly {
    version: u32,
}

pub fn encode(state: &PersistedState) -> Result<String> {
    let body = format!("{HEADER}{}", toml::to_string(state)?);
    let sum = blake3::hash(body.as_bytes()).to_hex();
    Ok(format!("{body}{CHECKSUM_PREFIX}{sum}\n"))
}

pub fn decode(text: &str) -> std::result::Result<PersistedState, DecodeError> {
    let trimmed = text.trim_end_matches(['\n', '\r']);
    let (body, last_line) = match trimmed.rfind('\n') {
        Some(idx) => (&trimmed[..=idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    };

    let expected = last_line
        .strip_prefix(CHECKSUM_PREFIX)
        .map(str::trim)
        .ok_or(DecodeError::MissingChecksum)?;
    let actual = blake3::hash(body.as_bytes()).to_hex().to_string();
    if expected != actual {
        return Err(DecodeError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    let VersionOnly { version } = toml::from_str(body)?;
    if version != STATE_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    Ok(toml::from_str(body)?)
}
