//! The three pipeline executors (RAG, GENERAL, TOOL) and the envelope
//! they all produce. [`Pipeline`] is the dispatcher's single entry point;
//! which variant runs is decided upstream by [`crate::router::IntentRouter`].

pub mod envelope;
pub mod general;
pub mod history;
pub mod rag;
pub mod tool;

pub use envelope::{classification, Envelope, LanguageData, SentimentData, SourceRef};
pub use general::GeneralPipeline;
pub use rag::{RagConfig, RagPipeline};
pub use tool::ToolPipeline;

use crate::model::Message;

/// A bundle of the three executors, constructed once per process and
/// dispatched per message according to the routed [`crate::router::Intent`].
pub struct Pipeline {
    pub general: GeneralPipeline,
    pub rag: RagPipeline,
    pub tool: ToolPipeline,
}

impl Pipeline {
    pub fn new(general: GeneralPipeline, rag: RagPipeline, tool: ToolPipeline) -> Self {
        Self { general, rag, tool }
    }

    pub async fn run(
        &self,
        intent: crate::router::Intent,
        session_id: &str,
        history: &[Message],
        user_text: &str,
    ) -> Envelope {
        use crate::router::Intent;
        match intent {
            Intent::General => self.general.run(session_id, history, user_text).await,
            Intent::Rag => self.rag.run(session_id, history, user_text).await,
            Intent::Tool => self.tool.run(session_id, history, user_text).await,
        }
    }
}
