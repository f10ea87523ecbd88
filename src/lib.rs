// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod probe;
pub mod regrid;
pub mod state;
pub mod tracker;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::engine::{Runtime, StepStatus};
use crate::exec::ProcessInvoker;
use crate::fs::RealFileSystem;
use crate::tracker::ForcingPolicy;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, then runs a single pass (or prints a
/// preview for `--dry-run`).
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let invoker = ProcessInvoker::from_config(&cfg);
    let mut runtime = Runtime::new(cfg.clone(), Arc::new(RealFileSystem), invoker)?;

    if args.dry_run {
        let statuses = runtime.preview(Utc::now())?;
        print_dry_run(&cfg, runtime.policy(), &statuses);
        return Ok(());
    }

    runtime.run_pass(Utc::now()).await?;
    Ok(())
}

/// Dry-run output: the resolved policy and the current classification of
/// every tracked step.
fn print_dry_run(cfg: &ConfigFile, policy: &ForcingPolicy, statuses: &[StepStatus]) {
    println!("forcewatch dry-run");
    println!("  policy = {} ({:?})", policy.name, policy.step_mode);
    println!("  steps = {:?}", policy.steps);
    println!("  state_file = {:?}", cfg.config.state_file);
    println!(
        "  very_late_minutes = {}, max_wait_minutes = {:?}, hours_back = {}",
        cfg.config.very_late_minutes, cfg.config.max_wait_minutes, cfg.config.hours_back
    );
    println!(
        "  on_action_failure = {:?}, max_attempts = {}",
        cfg.config.on_action_failure, cfg.config.max_attempts
    );
    println!();

    println!("sources ({}), most preferred first:", policy.sources.len());
    for source in policy.sources.iter() {
        println!(
            "  - {} (priority {}{})",
            source.name,
            source.priority,
            if source.passthrough { ", passthrough" } else { "" }
        );
        for input in source.inputs.iter() {
            println!(
                "      {}: {:?} lead {}h lag {}h",
                input.name, input.dir, input.lead_hour, input.lag_hours
            );
        }
    }
    println!();

    if statuses.is_empty() {
        println!("no cycles tracked");
    } else {
        println!("steps:");
        for status in statuses {
            let mut flags = Vec::new();
            if status.dispatched {
                flags.push("dispatched");
            }
            if status.needs_attention {
                flags.push("needs attention");
            }
            println!(
                "  {} {}{} available={:?} missing_sources={:?}",
                status.key,
                status.readiness.as_str(),
                if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                },
                status.available,
                status.missing_sources
            );
        }
    }

    debug!("dry-run complete (no execution)");
}
