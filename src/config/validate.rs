// src/config/validate.rs

use std::collections::HashSet;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{config_error, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ForcewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Run every semantic check on a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_sources(cfg)?;
    validate_policy(cfg)?;
    validate_actions(cfg)?;
    validate_regrid(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.state_file.as_os_str().is_empty() {
        return Err(config_error("[config].state_file must not be empty"));
    }
    if cfg.config.max_attempts == 0 {
        return Err(config_error("[config].max_attempts must be >= 1 (got 0)"));
    }
    if cfg.config.action_timeout_seconds == 0 {
        return Err(config_error(
            "[config].action_timeout_seconds must be >= 1 (got 0)",
        ));
    }
    // A single action must fit inside the lock's stale window.
    let stale_seconds = cfg.config.lock_stale_minutes.saturating_mul(60);
    if stale_seconds != 0 && stale_seconds <= cfg.config.action_timeout_seconds {
        return Err(config_error(format!(
            "[config].lock_stale_minutes ({}) must be longer than action_timeout_seconds ({}s), \
             or 0 to never reap",
            cfg.config.lock_stale_minutes, cfg.config.action_timeout_seconds
        )));
    }
    Ok(())
}

fn validate_sources(cfg: &RawConfigFile) -> Result<()> {
    if cfg.source.is_empty() {
        return Err(config_error(
            "config must contain at least one [source.<name>] section",
        ));
    }

    let mut input_names = HashSet::new();
    for (name, source) in cfg.source.iter() {
        if name.trim().is_empty() || name.contains(char::is_whitespace) {
            return Err(config_error(format!(
                "source name {name:?} must be non-empty and contain no whitespace"
            )));
        }
        if source.inputs.is_empty() {
            return Err(config_error(format!(
                "source '{name}' must list at least one input"
            )));
        }
        for input in source.inputs.iter() {
            if input.name.trim().is_empty() {
                return Err(config_error(format!(
                    "source '{name}' has an input with an empty name"
                )));
            }
            if !input_names.insert(input.name.as_str()) {
                return Err(config_error(format!(
                    "input name '{}' is used more than once",
                    input.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_policy(cfg: &RawConfigFile) -> Result<()> {
    let policy = &cfg.policy;

    if policy.steps.is_empty() {
        return Err(config_error("[policy].steps must list at least one step"));
    }
    let mut seen = HashSet::new();
    for step in policy.steps.iter() {
        if !seen.insert(*step) {
            return Err(config_error(format!(
                "[policy].steps lists step {step} more than once"
            )));
        }
    }

    let n_sources = cfg.source.len();
    if policy.min_sources_for_partial == 0 || policy.min_sources_for_partial > n_sources {
        return Err(config_error(format!(
            "[policy].min_sources_for_partial must be between 1 and {n_sources} (got {})",
            policy.min_sources_for_partial
        )));
    }

    for step in policy.force_on_first_pass.iter() {
        if !seen.contains(step) {
            return Err(config_error(format!(
                "[policy].force_on_first_pass names step {step}, which is not in [policy].steps"
            )));
        }
    }
    Ok(())
}

fn validate_actions(cfg: &RawConfigFile) -> Result<()> {
    match cfg.action.full.as_deref() {
        Some(cmd) if !cmd.trim().is_empty() => Ok(()),
        _ => Err(config_error("[action].full must be set")),
    }
}

fn validate_regrid(cfg: &RawConfigFile) -> Result<()> {
    let Some(regrid) = cfg.regrid.as_ref() else {
        return Ok(());
    };

    for (name, source) in regrid.source.iter() {
        let has_command = source.command.is_some() || cfg.action.regrid.is_some();
        if !has_command {
            return Err(config_error(format!(
                "regrid source '{name}' has no command and [action].regrid is not set"
            )));
        }
        if let Some(pattern) = source.pattern.as_deref() {
            Regex::new(pattern).map_err(|e| {
                config_error(format!("regrid source '{name}' has invalid pattern: {e}"))
            })?;
        }
    }
    Ok(())
}
