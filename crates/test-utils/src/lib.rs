//! Shared helpers for the forcewatch integration tests: config builders, a
//! scripted invoker and forcing-file fixtures.

pub mod builders;
pub mod fake_invoker;
pub mod fixtures;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{ConfigFileBuilder, SourceBuilder};
pub use fake_invoker::FakeInvoker;

static TRACING: Once = Once::new();

/// Route `tracing` output into the test harness capture.
///
/// Reads the same `FORCEWATCH_LOG` directive as the binary and defaults to
/// `warn`, so a failing test shows degraded dispatches and probe problems
/// but not every arrival. Use `-- --nocapture` to see output of passing
/// tests.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = std::env::var(forcewatch::logging::LOG_ENV_VAR)
            .ok()
            .and_then(|s| EnvFilter::try_new(s).ok())
            .unwrap_or_else(|| EnvFilter::new("warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}
