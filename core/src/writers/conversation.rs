//! Conversation writer: the user turn and the assistant turn are written
//! sequentially as a pair. Grounded in `chatbot_engine.py`'s
//! `_log_conversation`: this path is must-succeed — if the user-turn write
//! fails, the whole message is treated as failed rather than writing a
//! lone assistant turn with no matching question.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WriterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub message_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn put_turn(&self, turn: ConversationTurn) -> Result<(), WriterError>;
}

pub struct ConversationWriter {
    store: std::sync::Arc<dyn ConversationStore>,
}

impl ConversationWriter {
    pub fn new(store: std::sync::Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Writes the user turn, then the assistant turn. Returns as soon as
    /// either write fails — a lone assistant turn with no recorded
    /// question is worse than no record at all.
    pub async fn log(
        &self,
        session_id: &str,
        message_id: &str,
        user_text: &str,
        assistant_text: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WriterError> {
        self.store
            .put_turn(ConversationTurn {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
                role: Role::User,
                content: user_text.to_string(),
                timestamp: now,
            })
            .await?;

        self.store
            .put_turn(ConversationTurn {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
                role: Role::Assistant,
                content: assistant_text.to_string(),
                timestamp: now,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        turns: Mutex<Vec<ConversationTurn>>,
        fail_role: Mutex<Option<Role>>,
    }

    #[async_trait]
    impl ConversationStore for RecordingStore {
        async fn put_turn(&self, turn: ConversationTurn) -> Result<(), WriterError> {
            if self.fail_role.lock().unwrap().as_ref() == Some(&turn.role) {
                return Err(WriterError::ConversationWrite("forced failure".into()));
            }
            self.turns.lock().unwrap().push(turn);
            Ok(())
        }
    }

    #[tokio::test]
    async fn logs_user_then_assistant_turn() {
        let store = std::sync::Arc::new(RecordingStore::default());
        let writer = ConversationWriter::new(store.clone());
        writer
            .log("s1", "m1", "hi", "hello!", Utc::now())
            .await
            .unwrap();
        let turns = store.turns.lock().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn aborts_whole_message_when_user_turn_write_fails() {
        let store = std::sync::Arc::new(RecordingStore::default());
        *store.fail_role.lock().unwrap() = Some(Role::User);
        let writer = ConversationWriter::new(store.clone());
        let err = writer.log("s1", "m1", "hi", "hello!", Utc::now()).await;
        assert!(err.is_err());
        assert!(store.turns.lock().unwrap().is_empty());
    }
}
