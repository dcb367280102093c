//! Tracing setup for test runs.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes through the test harness's capture.
///
/// Defaults to `warn`; set `RUST_LOG=hero_query=debug` to see every
/// statement sent to the database. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
