//! Model client: uniform façade over the LLM inference endpoint, with
//! dialect negotiation and the endpoint fallback ladder.

pub mod client;
pub mod dialect;

pub use client::{GenerateResult, HttpModelTransport, Message, ModelClient, ModelEndpointConfig, ModelTransport, TokenUsage};
pub use dialect::{Dialect, Role};
