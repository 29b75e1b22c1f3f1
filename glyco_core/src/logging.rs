//! Logging infrastructure for Glyco.
//!
//! Provides centralized tracing setup for the `glyco` binary and for tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with sensible defaults
///
/// This sets up tracing with:
/// - Environment-based filtering (RUST_LOG)
/// - Compact format on stderr, leaving stdout to command output
/// - INFO as the default level
///
/// Call once per process; a second call panics inside `tracing-subscriber`.
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Filter directive used when RUST_LOG is unset,
///   e.g. `warn` or `glyco_core=debug,warn`
///
/// The CLI passes `warn` so alerts from the log sink and skipped journal
/// lines still surface while routine store activity stays quiet.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Initialize logging for tests
///
/// Output goes through the test writer so it is captured per test and only
/// shown on failure. Safe to call from every test.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("glyco_core=debug"))
        .try_init();
}
