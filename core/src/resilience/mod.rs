//! Resilience fabric: retry with backoff, and per-service circuit breaking.
//!
//! Every client in `model/`, `retrieval/`, `tools/`, `session/`, and
//! `writers/` wraps its external call with a [`retry::RetryPolicy`] and
//! checks a shared [`circuit_breaker::CircuitRegistry`] before attempting the
//! call at all. The registry is constructed once in the gateway binary and
//! threaded through every client constructor as an `Arc`.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{service, CircuitBreaker, CircuitRegistry, CircuitState, FallbackLadder};
pub use retry::{RetryPolicy, RetryPresets, RetryableError};
