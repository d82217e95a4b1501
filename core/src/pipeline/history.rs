//! Conversation-history shaping shared by every pipeline. Grounded in
//! `chatbot_engine.py`'s `_enhance_conversation_context`: drop empty and
//! system turns, then keep only the most recent `MAX_HISTORY_TURNS`.

use crate::model::Message;

const MAX_HISTORY_TURNS: usize = 10;

/// Filters out blank-content turns and caps history to the most recent
/// `MAX_HISTORY_TURNS`, oldest-first, so the model sees a bounded window
/// regardless of how long the session has run.
pub fn enhance_conversation_context(history: &[Message]) -> Vec<Message> {
    let filtered: Vec<Message> = history
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .cloned()
        .collect();

    let start = filtered.len().saturating_sub(MAX_HISTORY_TURNS);
    filtered[start..].to_vec()
}
