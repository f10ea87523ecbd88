// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{config_error, Result};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| config_error(format!("cannot read config file {:?}: {e}", path)))?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Resolves relative paths against the directory of the config file.
/// - Checks policy/source consistency (see `validate.rs`).
/// - Checks that the state file's directory exists.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;
    resolve_paths(&mut raw_config, &config_root_dir(path));

    let config = ConfigFile::try_from(raw_config)?;
    ensure_state_dir(&config)?;
    Ok(config)
}

/// Figure out the directory relative paths in the config refer to.
///
/// - If the config path has a non-empty parent (e.g. "configs/short.toml"),
///   we use that directory.
/// - If it's just a bare filename like "short.toml" (parent = ""),
///   we fall back to the current working directory "."
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn resolve_paths(raw: &mut RawConfigFile, base: &Path) {
    resolve(base, &mut raw.config.state_file);
    if let Some(lock) = raw.config.lock_file.as_mut() {
        resolve(base, lock);
    }
    for source in raw.source.values_mut() {
        for input in source.inputs.iter_mut() {
            resolve(base, &mut input.dir);
        }
    }
    if let Some(regrid) = raw.regrid.as_mut() {
        for source in regrid.source.values_mut() {
            resolve(base, &mut source.dir);
        }
    }
}

fn ensure_state_dir(cfg: &ConfigFile) -> Result<()> {
    let state_file = &cfg.config.state_file;
    match state_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => Err(config_error(format!(
            "state file directory {:?} does not exist",
            dir
        ))),
        _ => Ok(()),
    }
}
