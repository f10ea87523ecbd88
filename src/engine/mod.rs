// src/engine/mod.rs

//! Orchestration engine for forcewatch.
//!
//! One invocation is one pass: observe the newest issue time, refresh
//! availability, classify and dispatch every tracked step, regrid new files,
//! save.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::dispatch::{ActionPlan, FailureHandling, Outcome};
use crate::exec::ActionRequest;
use crate::regrid::Candidate;
use crate::tracker::{Readiness, StepKey, Timing};

pub mod core;
pub mod events;
pub mod runtime;

pub use core::CoreRuntime;
pub use events::PassEvent;
pub use runtime::{PassReport, Runtime};

/// Knobs the core needs from `[config]`.
#[derive(Debug, Clone, Copy)]
pub struct CoreSettings {
    pub timing: Timing,
    pub failure: FailureHandling,
}

/// A new file for one regrid source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegridJob {
    pub source: String,
    pub candidate: Candidate,
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Run a layering variant for one step, then settle it.
    Layer {
        plan: ActionPlan,
        request: ActionRequest,
    },
    /// Regrid one raw file, then settle it.
    Regrid {
        job: RegridJob,
        request: ActionRequest,
    },
}

/// What the core decided in one planning call.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Actions the shell should invoke, in order.
    pub commands: Vec<CoreCommand>,
    /// Steps that were settled without an invocation.
    pub outcomes: Vec<(StepKey, Outcome)>,
    pub events: Vec<PassEvent>,
}

/// Read-only view of one step, as printed by `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub key: StepKey,
    pub readiness: Readiness,
    pub dispatched: bool,
    pub needs_attention: bool,
    pub available: Vec<String>,
    pub missing_sources: Vec<String>,
}
