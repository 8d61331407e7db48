#![forbid(unsafe_code)]

//! Test logging.
//!
//! `RUST_LOG=xbind_runtime=trace cargo test -p xbind-harness` shows every slot
//! evaluation, skipped write, and deferral.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a `fmt` subscriber writing through the test harness.
///
/// Filtered by `RUST_LOG`, `warn` when unset. Safe to call from every test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
