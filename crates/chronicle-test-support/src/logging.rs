//! Log capture for tests.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber that writes through the test harness, so log
/// output is shown only for failing tests. Honors `RUST_LOG`, defaulting to
/// `debug`. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
