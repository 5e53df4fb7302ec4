//! Tracing setup for test binaries.

use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber for the current process, once.
///
/// The filter honors `RUST_LOG` and defaults to `info`. Output goes
/// through the test writer so `cargo test` captures it per test.
/// Later calls are no-ops, so every test can call this first.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
