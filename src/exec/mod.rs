// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ActionInvoker` trait and the request/outcome
//!   types; tests replace the invoker with a fake.
//! - [`template`] maps action kinds to configured command templates and
//!   renders them.
//! - [`process`] runs rendered commands through the shell with a timeout.

pub mod backend;
pub mod process;
pub mod template;

pub use backend::{ActionInvoker, ActionOutcome, ActionRequest};
pub use process::ProcessInvoker;
pub use template::{render, CommandTable};
