//! Websocket gateway library: configuration, frame normalization, and the
//! per-connection dispatcher. `main.rs` wires these into an axum server.

pub mod config;
pub mod dispatcher;
pub mod frame;
pub mod stores;
pub mod telemetry;
pub mod ws;

pub use config::{Cli, GatewayConfig};
pub use dispatcher::Dispatcher;
