//! Vision-capable incident classification. Grounded in
//! `mbpp_workflows.py`'s `classify_incident`: a text (and optionally
//! image) description goes to the model with a classification prompt; the
//! model's JSON is extracted defensively, and an unclassifiable reply
//! degrades to a safe default rather than blocking the workflow.

use std::sync::Arc;

use serde_json::Value;

use crate::model::{Message, ModelClient};
use crate::workflow::state::TicketDraft;

/// Images above this size are dropped before the vision call rather than
/// sent — keeps the classification prompt within the model's payload
/// limits and avoids paying for a multi-megabyte upload on every draft.
pub const IMAGE_SIZE_GATE_BYTES: usize = 1_000_000;

const DEFAULT_FEEDBACK_TYPE: &str = "Aduan";
const DEFAULT_CATEGORY: &str = "JALAN";
const DEFAULT_SUB_CATEGORY: &str = "--";

const CLASSIFY_SYSTEM_PROMPT: &str = "You classify a civic incident report into a feedback \
type, a category, and a sub-category, based on the user's description (and an attached photo, \
when present). Respond with ONLY a JSON object: \
{\"feedback_type\": \"...\", \"category\": \"...\", \"sub_category\": \"...\"}. \
If you genuinely cannot tell, use feedback_type \"Aduan\", category \"JALAN\", sub_category \"--\".";

pub struct IncidentClassifier {
    model: Arc<ModelClient>,
}

impl IncidentClassifier {
    pub fn new(model: Arc<ModelClient>) -> Self {
        Self { model }
    }

    pub async fn classify(&self, description: &str, image_base64: Option<&str>) -> TicketDraft {
        let user_text = match image_base64 {
            Some(image) if image.len() <= IMAGE_SIZE_GATE_BYTES => {
                format!("{description}\n\n[attached photo, base64-encoded]\n{image}")
            }
            Some(_) => {
                tracing::debug!("incident photo exceeds size gate, classifying from text only");
                description.to_string()
            }
            None => description.to_string(),
        };

        let result = self
            .model
            .generate(&[Message::user(user_text)], Some(CLASSIFY_SYSTEM_PROMPT), 256, 0.0)
            .await;

        if result.is_fallback {
            return default_draft(description);
        }

        parse_classification(&result.text)
            .map(|(feedback_type, category, sub_category)| TicketDraft {
                feedback_type,
                category,
                sub_category,
                description: description.to_string(),
            })
            .unwrap_or_else(|| default_draft(description))
    }
}

fn default_draft(description: &str) -> TicketDraft {
    TicketDraft {
        feedback_type: DEFAULT_FEEDBACK_TYPE.to_string(),
        category: DEFAULT_CATEGORY.to_string(),
        sub_category: DEFAULT_SUB_CATEGORY.to_string(),
        description: description.to_string(),
    }
}

/// Extracts the first balanced `{...}` span and reads the three expected
/// string fields, tolerating a missing field by falling back to the
/// matching default rather than failing the whole parse.
fn parse_classification(text: &str) -> Option<(String, String, String)> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut end = None;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset + ch.len_utf8());
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let value: Value = serde_json::from_str(&text[start..end]).ok()?;
    let feedback_type = value
        .get("feedback_type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_FEEDBACK_TYPE)
        .to_string();
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    let sub_category = value
        .get("sub_category")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_SUB_CATEGORY)
        .to_string();
    Some((feedback_type, category, sub_category))
}
