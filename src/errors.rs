// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForcewatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForcewatchError {
    /// True for errors that stem from the configuration rather than from a
    /// run (mapped to exit code 1 by the CLI together with other fatals).
    pub fn is_config_error(&self) -> bool {
        matches!(self, ForcewatchError::ConfigError(_) | ForcewatchError::TomlError(_))
    }
}

pub fn config_error(msg: impl ToString) -> ForcewatchError {
    ForcewatchError::ConfigError(msg.to_string())
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ForcewatchError>;
