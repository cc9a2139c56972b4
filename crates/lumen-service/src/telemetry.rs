//! # Telemetry
//!
//! Tracing initialization for hosts that don't bring their own
//! subscriber.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber with an env-filter.
///
/// Default level is INFO; override with `RUST_LOG` (e.g.
/// `RUST_LOG=lumen_store=debug`). Safe to call more than once - later
/// calls are no-ops, which keeps test binaries happy.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .ok();
}
