//! Shared system-prompt building blocks composed by each pipeline.

pub mod base;

pub use base::{compose, BASE_SYSTEM_PROMPT};
