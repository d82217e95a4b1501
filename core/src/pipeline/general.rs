//! GENERAL pipeline: open-ended conversation with no retrieval or tool
//! step. Grounded in `chatbot_engine.py`'s default `process_message` path
//! and `_enhance_conversation_context` (drop empty/system turns, keep the
//! last 10).

use std::sync::Arc;

use crate::model::{Message, ModelClient};
use crate::parser::parse_structured_reply;
use crate::prompts::compose;

use super::envelope::{classification, Envelope};
use super::history::enhance_conversation_context;

const GENERAL_INSTRUCTIONS: &str = "Answer the user's message directly and conversationally. \
You have no document index or external tools for this turn; if the user needs one of those, \
say so plainly rather than guessing.";

pub struct GeneralPipeline {
    model: Arc<ModelClient>,
}

impl GeneralPipeline {
    pub fn new(model: Arc<ModelClient>) -> Self {
        Self { model }
    }

    pub async fn run(&self, session_id: &str, history: &[Message], user_text: &str) -> Envelope {
        self.run_with_note(session_id, history, user_text, None).await
    }

    /// Same as [`Self::run`], but with an extra note folded into the system
    /// prompt. Used by the RAG and TOOL pipelines when they delegate here
    /// because nothing matched (§4.7.2/§4.7.3) — the reply still carries
    /// `classification::GENERAL` since no citation or tool result backs it.
    pub async fn run_with_note(
        &self,
        session_id: &str,
        history: &[Message],
        user_text: &str,
        note: Option<&str>,
    ) -> Envelope {
        let started = std::time::Instant::now();
        let mut messages = enhance_conversation_context(history);
        messages.push(Message::user(user_text));

        let instructions = match note {
            Some(note) => format!("{GENERAL_INSTRUCTIONS}\n\n{note}"),
            None => GENERAL_INSTRUCTIONS.to_string(),
        };
        let system_prompt = compose(&instructions);
        let result = self.model.generate(&messages, Some(&system_prompt), 1024, 0.7).await;
        let parsed = parse_structured_reply(&result.text);
        let response_ms = started.elapsed().as_millis() as u64;
        Envelope::from_parsed(session_id, classification::GENERAL, parsed, Vec::new(), Vec::new(), result.is_fallback, response_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpModelTransport, ModelEndpointConfig};
    use crate::resilience::{CircuitRegistry, RetryPolicy};

    fn model_client() -> Arc<ModelClient> {
        Arc::new(ModelClient::new(
            Arc::new(HttpModelTransport::new("http://localhost:0")),
            Arc::new(CircuitRegistry::for_service_defaults()),
            RetryPolicy::new(1, std::time::Duration::from_millis(1), std::time::Duration::from_millis(1)),
            ModelEndpointConfig {
                inference_profile: None,
                cross_region_profile: None,
                direct_model_id: "unreachable".into(),
            },
        ))
    }

    #[tokio::test]
    async fn unreachable_model_yields_fallback_envelope() {
        let pipeline = GeneralPipeline::new(model_client());
        let envelope = pipeline.run("session-1", &[], "hello").await;
        assert!(envelope.is_fallback);
        assert_eq!(envelope.session_id, "session-1");
    }
}
