//! Logging and observability helpers.

pub mod sensitive;

pub use sensitive::Sensitive;

use tracing_subscriber::EnvFilter;

/// Initializes a global tracing subscriber for host binaries and tests.
///
/// Respects `RUST_LOG`; defaults to `fanquery=info`. Safe to call more than
/// once — later calls are no-ops.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fanquery=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
