//! Tracing subscriber setup: env-filtered structured logging, one line of
//! JSON per span event, matching the span/field vocabulary in
//! `conduit_core::otel`.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber from `RUST_LOG`, defaulting
/// to `info` for this crate and `conduit_core` when unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("conduit_gateway=info,conduit_core=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
