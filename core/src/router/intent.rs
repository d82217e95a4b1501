//! Intent router: keyword pre-filter, then a model-backed classifier for
//! the long tail. Classification must never block a user reply, so any
//! parse failure or model error defaults to GENERAL — the safe path.

use serde::{Deserialize, Serialize};

use super::prompts::CLASSIFY_SYSTEM_PROMPT;
use crate::model::{Message, ModelClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Rag,
    General,
    Tool,
}

/// Small closed keyword sets for the cheap pre-filter. Tool keywords are
/// checked before document keywords so an "events document" style message
/// still routes to TOOL, matching the stage-1 ordering in the design.
const TOOL_KEYWORDS: &[&str] = &["event", "events", "schedule a", "book a", "list events"];
const DOCUMENT_KEYWORDS: &[&str] = &["document", "policy", "terms", "manual", "agreement"];

pub struct IntentRouter {
    model: std::sync::Arc<ModelClient>,
}

impl IntentRouter {
    pub fn new(model: std::sync::Arc<ModelClient>) -> Self {
        Self { model }
    }

    pub async fn classify(&self, user_text: &str) -> Intent {
        if let Some(intent) = keyword_prefilter(user_text) {
            return intent;
        }
        self.classify_via_model(user_text).await
    }

    async fn classify_via_model(&self, user_text: &str) -> Intent {
        let result = self
            .model
            .generate(&[Message::user(user_text)], Some(CLASSIFY_SYSTEM_PROMPT), 16, 0.0)
            .await;
        if result.is_fallback {
            return Intent::General;
        }
        parse_intent(&result.text).unwrap_or(Intent::General)
    }
}

fn keyword_prefilter(user_text: &str) -> Option<Intent> {
    let lowered = user_text.to_lowercase();
    if TOOL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return Some(Intent::Tool);
    }
    if DOCUMENT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return Some(Intent::Rag);
    }
    None
}

/// Parses the first whole-word match of RAG/GENERAL/TOOL from the model's
/// reply. Whole-word matching avoids false positives (e.g. "category" would
/// otherwise substring-match nothing, but this guards future keyword
/// additions from partial-word collisions).
fn parse_intent(text: &str) -> Option<Intent> {
    let upper = text.to_uppercase();
    for word in upper.split(|c: char| !c.is_ascii_alphabetic()) {
        match word {
            "RAG" => return Some(Intent::Rag),
            "GENERAL" => return Some(Intent::General),
            "TOOL" => return Some(Intent::Tool),
            _ => continue,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_prefilter_routes_tool_keywords() {
        assert_eq!(keyword_prefilter("show me all events"), Some(Intent::Tool));
    }

    #[test]
    fn keyword_prefilter_routes_document_keywords() {
        assert_eq!(
            keyword_prefilter("what does the policy document say about refunds?"),
            Some(Intent::Rag)
        );
    }

    #[test]
    fn keyword_prefilter_falls_through_on_no_match() {
        assert_eq!(keyword_prefilter("hello, how are you?"), None);
    }

    #[test]
    fn parse_intent_matches_whole_word() {
        assert_eq!(parse_intent("Classification: TOOL"), Some(Intent::Tool));
        assert_eq!(parse_intent("general"), Some(Intent::General));
        assert_eq!(parse_intent("I cannot classify this"), None);
    }
}
