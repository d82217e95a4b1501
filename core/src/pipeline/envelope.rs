//! The reply envelope shared by every pipeline and carried to the egress
//! frame. Fields mirror the structured JSON the model is asked to emit
//! (see [`crate::prompts::base`]), separated into sub-structs so the
//! gateway's egress frame can nest `language_data`/`sentiment_data`
//! independently of the top-level fields.

use serde::{Deserialize, Serialize};

use crate::parser::ParsedReply;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageData {
    pub detected_language: String,
    pub language_name: String,
    /// Confidence in the detected language, not emitted by the model
    /// envelope itself (§4.8 only asks it to emit the language code): high
    /// when the model's own envelope named the language, lower when the
    /// script/lexical heuristic in [`crate::parser`] had to guess.
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentData {
    pub detected_sentiment: String,
    pub sentiment_confidence: f32,
    pub requires_attention: bool,
    pub response_tone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub session_id: String,
    pub response: String,
    /// The routing class this envelope came from, mirrored into the
    /// egress frame's `query_type` (§6): `"rag" | "general" | "mcp_tool" |
    /// "workflow" | "error_fallback"`.
    pub classification: String,
    pub language_data: LanguageData,
    pub sentiment_data: SentimentData,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub tools_invoked: Vec<String>,
    pub is_fallback: bool,
    pub parsing_error: Option<String>,
    /// Wall-clock time the pipeline spent producing this envelope. Used
    /// for the `response_ms >= 0` testable property (§8) and as an
    /// analytics latency field; not part of the egress frame.
    pub response_ms: u64,
}

impl Envelope {
    /// Builds an envelope from a parsed model reply, attaching whatever
    /// sources/tool names the calling pipeline resolved.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parsed(
        session_id: impl Into<String>,
        classification: impl Into<String>,
        parsed: ParsedReply,
        sources: Vec<SourceRef>,
        tools_invoked: Vec<String>,
        is_fallback: bool,
        response_ms: u64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            response: parsed.response,
            classification: classification.into(),
            language_data: LanguageData {
                detected_language: parsed.detected_language,
                language_name: parsed.language_name,
                confidence: parsed.language_confidence,
            },
            sentiment_data: SentimentData {
                detected_sentiment: parsed.detected_sentiment,
                sentiment_confidence: parsed.sentiment_confidence,
                requires_attention: parsed.requires_attention,
                response_tone: parsed.response_tone,
            },
            sources,
            tools_invoked,
            is_fallback,
            parsing_error: parsed.parsing_error,
            response_ms,
        }
    }
}

/// The `query_type` vocabulary (§6 egress frame / §4.7 envelope contract).
pub mod classification {
    pub const RAG: &str = "rag";
    pub const GENERAL: &str = "general";
    pub const TOOL: &str = "mcp_tool";
    pub const WORKFLOW: &str = "workflow";
    pub const ERROR_FALLBACK: &str = "error_fallback";
}
