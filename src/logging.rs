//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout carries only the report.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `info`, for example
/// `RUST_LOG=bess_sizing=debug` to see every convergence iteration.
///
/// ```no_run
/// bess_sizing::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Debug-level subscriber for tests; safe to call more than once.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
