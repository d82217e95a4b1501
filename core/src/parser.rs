//! Parses the model's structured JSON-envelope reply into a typed,
//! always-present result. Grounded in `multilingual_prompts.py`'s
//! downstream envelope consumers and `chatbot_engine.py`'s response
//! handling: a malformed or missing envelope must never surface an error
//! to the user, so every field here has a defensible default and parse
//! failures are recorded rather than propagated.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The model's reply, normalised to always-present fields. `parsing_error`
/// is `Some` when the model's output did not parse as the expected JSON
/// envelope, in which case `response` falls back to the model's raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedReply {
    pub response: String,
    pub detected_language: String,
    pub language_name: String,
    /// Confidence the language is correct: high when the model's envelope
    /// named it explicitly, lower when [`detect_language_heuristic`] had
    /// to guess from script range or lexical hints.
    pub language_confidence: f32,
    pub detected_sentiment: String,
    pub sentiment_confidence: f32,
    pub requires_attention: bool,
    pub response_tone: String,
    pub parsing_error: Option<String>,
}

const DEFAULT_SENTIMENT: &str = "NEUTRAL";
const DEFAULT_TONE: &str = "professional";

pub fn parse_structured_reply(raw: &str) -> ParsedReply {
    let stripped = strip_code_fence(raw);
    let candidate = extract_json_object(stripped).unwrap_or(stripped);

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => {
            let response = map
                .get("response")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| raw.trim().to_string());

            let (fallback_code, fallback_name) = detect_language_heuristic(&response);
            let language_from_model = map.get("detected_language").and_then(Value::as_str).is_some();
            let detected_language = map
                .get("detected_language")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(fallback_code);
            let language_name = map
                .get("language_name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(fallback_name);
            let language_confidence = if language_from_model { 0.9 } else { 0.6 };

            let detected_sentiment = map
                .get("detected_sentiment")
                .and_then(Value::as_str)
                .map(str::to_uppercase)
                .filter(|s| matches!(s.as_str(), "POSITIVE" | "NEGATIVE" | "NEUTRAL" | "MIXED"))
                .unwrap_or_else(|| DEFAULT_SENTIMENT.to_string());

            let sentiment_confidence = map
                .get("sentiment_confidence")
                .and_then(Value::as_f64)
                .map(|v| v.clamp(0.0, 1.0) as f32)
                .unwrap_or(0.5);

            let requires_attention = map
                .get("requires_attention")
                .and_then(Value::as_bool)
                .unwrap_or_else(|| {
                    detected_sentiment == "NEGATIVE" && sentiment_confidence >= 0.7
                        || detected_sentiment == "MIXED" && sentiment_confidence >= 0.8
                });

            let response_tone = map
                .get("response_tone")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_TONE.to_string());

            ParsedReply {
                response,
                detected_language,
                language_name,
                language_confidence,
                detected_sentiment,
                sentiment_confidence,
                requires_attention,
                response_tone,
                parsing_error: None,
            }
        }
        Ok(_) | Err(_) => fallback_reply(raw, "model reply was not a JSON object envelope"),
    }
}

fn fallback_reply(raw: &str, reason: &str) -> ParsedReply {
    let response = raw.trim().to_string();
    let (detected_language, language_name) = detect_language_heuristic(&response);
    ParsedReply {
        response,
        detected_language,
        language_name,
        language_confidence: 0.6,
        detected_sentiment: DEFAULT_SENTIMENT.to_string(),
        sentiment_confidence: 0.5,
        requires_attention: false,
        response_tone: DEFAULT_TONE.to_string(),
        parsing_error: Some(reason.to_string()),
    }
}

/// Strips a leading/trailing ```json or ``` code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let after_open = after_open.trim_start_matches(['\n', '\r']);
    match after_open.rfind("```") {
        Some(idx) => after_open[..idx].trim(),
        None => after_open.trim(),
    }
}

/// Extracts the first balanced `{...}` span, tolerating leading/trailing
/// prose the model sometimes wraps the envelope in despite instructions.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Best-effort language detection for use when the envelope omits
/// `detected_language`, or parsing fails outright. Script ranges are exact;
/// Bahasa Malaysia has no distinct script, so it's inferred from common
/// function words.
fn detect_language_heuristic(text: &str) -> (String, String) {
    let has_cjk = text.chars().any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c));
    if has_cjk {
        return ("zh".to_string(), "Mandarin".to_string());
    }
    let has_tamil = text.chars().any(|c| ('\u{0B80}'..='\u{0BFF}').contains(&c));
    if has_tamil {
        return ("ta".to_string(), "Tamil".to_string());
    }
    let lowered = text.to_lowercase();
    const MALAY_HINTS: &[&str] = &[
        "saya", "anda", "tidak", "boleh", "terima kasih", "apa khabar", "adoi", "aiyaa", "lah",
    ];
    if MALAY_HINTS.iter().any(|hint| lowered.contains(hint)) {
        return ("ms".to_string(), "Bahasa Malaysia".to_string());
    }
    ("en".to_string(), "English".to_string())
}
