//! Tracing subscriber setup.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the host application's job. [`init`] is a convenience for binaries,
//! examples, and tests that just want `RUST_LOG`-style filtering on stderr.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
