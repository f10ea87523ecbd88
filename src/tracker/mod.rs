// src/tracker/mod.rs

//! Readiness tracking.
//!
//! - `policy`: the per-configuration descriptor (sources, inputs, steps).
//! - `cycle`: forecast cycles and lead steps as persisted.
//! - `readiness`: refreshing availability, classifying steps and picking the
//!   best action variant.

pub mod cycle;
pub mod policy;
pub mod readiness;

pub use cycle::{ForecastCycle, LeadStep, StepKey};
pub use policy::{ExpectedFile, ForcingPolicy, InputSpec, SourceSpec};
pub use readiness::{
    best_variant, classify, complete_sources, inputs_very_late, missing_sources,
    refresh_availability, start_cycle_clock, Readiness, RefreshReport, Timing, Variant,
};
