//! Observability utilities.
//!
//! The host logs through the `tracing` ecosystem; this module installs a
//! subscriber for binaries and ad-hoc debugging. Library code never
//! installs a subscriber itself.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber driven by `RUST_LOG`.
///
/// Defaults to `info` for this crate when `RUST_LOG` is unset. Safe to
/// call more than once; only the first call installs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("flowhost=info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
