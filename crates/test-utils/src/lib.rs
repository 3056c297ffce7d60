// crates/test-utils/src/lib.rs

//! Shared helpers for gatedag's integration and property tests.

pub mod builders;
pub mod fake_handlers;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialise a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Bound an async test so a regression hangs the suite for five seconds
/// instead of forever.
pub async fn with_timeout<F, T>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test timed out")
}
