// src/exec/backend.rs

//! Pluggable action invoker abstraction.
//!
//! The runtime talks to an `ActionInvoker` instead of spawning processes
//! itself, so tests can record requests and script outcomes while production
//! uses [`ProcessInvoker`](super::ProcessInvoker).

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::types::{ActionKind, IssueTime};

/// Everything an external tool needs to know about one piece of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub kind: ActionKind,
    /// Policy name from `[policy].name`.
    pub policy: String,
    /// Issue time of the cycle (layering) or of the raw file (regrid).
    pub issue: IssueTime,
    /// Step offset; `None` for regrid.
    pub step: Option<i32>,
    /// Valid time of the product; `None` for regrid.
    pub valid: Option<DateTime<Utc>>,
    /// Sources combined, most preferred first. For regrid, the regrid source.
    pub sources: Vec<String>,
    /// Input files the action reads.
    pub files: Vec<PathBuf>,
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.issue)?;
        if let Some(step) = self.step {
            write!(f, "/{step:+}")?;
        }
        if !self.sources.is_empty() {
            write!(f, " [{}]", self.sources.join(","))?;
        }
        Ok(())
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    /// Non-zero exit (or `-1` when there was no exit code).
    Failed(i32),
    /// Killed after exceeding the action timeout. Output may be partial.
    TimedOut,
}

/// Trait abstracting how actions are executed.
///
/// An `Err` means the action could not be started at all; the runtime treats
/// it like a failed run.
pub trait ActionInvoker: Send {
    fn invoke(
        &mut self,
        request: ActionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ActionOutcome>> + Send + '_>>;
}
