// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `forcewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "forcewatch",
    version,
    about = "Track arrival of forcing inputs and trigger layering/regrid actions.",
    long_about = "Runs a single pass: checks which forcing inputs have arrived, \
                  dispatches each forecast step once its inputs are ready (or \
                  degraded once they are late), and records what it did in the \
                  state file. Meant to be re-run by an external scheduler."
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FORCEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config, print the policy and how every tracked step would be
    /// classified, but don't invoke anything or write state.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
