// src/config/mod.rs

//! Configuration loading and validation for forcewatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and resolve its paths (`loader.rs`).
//! - Validate policy/source consistency (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ActionSection, ConfigFile, ConfigSection, InputConfig, PolicySection, RawConfigFile,
    RegridSection, RegridSourceConfig, SourceConfig,
};
pub use validate::validate_config;
