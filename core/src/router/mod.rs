//! Intent router: keyword pre-filter + LLM-backed classifier into
//! {RAG, GENERAL, TOOL}.

pub mod intent;
pub mod prompts;

pub use intent::{Intent, IntentRouter};
