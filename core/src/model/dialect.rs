//! Wire dialects for the two families of inference models this service
//! targets. Grounded in `strand_client.py`'s Claude-vs-Nova body shaping:
//! dialect A is the legacy `anthropic_version` shape, dialect B is the
//! structured `inferenceConfig` shape used by newer models.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `{anthropic_version, max_tokens, temperature, messages: [{role, content: <string>}], system: <string>}`
    A,
    /// `{messages: [{role, content: [{text}]}], inferenceConfig: {...}, system: [{text}]}`
    B,
}

impl Dialect {
    /// Detects dialect from the configured model identifier. Models whose
    /// id contains "nova" speak dialect B; everything else defaults to the
    /// legacy Claude-shaped dialect A.
    pub fn detect(model_id: &str) -> Self {
        if model_id.to_lowercase().contains("nova") {
            Dialect::B
        } else {
            Dialect::A
        }
    }

    pub fn build_request(
        self,
        messages: &[Message],
        system_prompt: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Value {
        match self {
            Dialect::A => {
                let mut body = json!({
                    "anthropic_version": "bedrock-2023-05-31",
                    "max_tokens": max_tokens,
                    "temperature": temperature,
                    "messages": messages.iter().map(|m| json!({
                        "role": m.role.as_str(),
                        "content": m.content,
                    })).collect::<Vec<_>>(),
                });
                if let Some(system) = system_prompt {
                    body["system"] = json!(system);
                }
                body
            }
            Dialect::B => {
                let mut body = json!({
                    "messages": messages.iter().map(|m| json!({
                        "role": m.role.as_str(),
                        "content": [{"text": m.content}],
                    })).collect::<Vec<_>>(),
                    "inferenceConfig": {
                        "maxTokens": max_tokens,
                        "temperature": temperature,
                    },
                });
                if let Some(system) = system_prompt {
                    body["system"] = json!([{"text": system}]);
                }
                body
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Extracts the generated text from a response body, trying dialect-B
/// shapes first (`content:[{text}]`, `output.message.content:[{text}]`)
/// then dialect-A (`content:[{type:"text", text}]`). Returns empty string
/// on a complete miss rather than raising — callers decide what empty
/// means (e.g. the structured-output parser falls back gracefully).
pub fn extract_text(body: &Value) -> String {
    if let Some(content) = body.get("content") {
        if let Some(items) = content.as_array() {
            for item in items {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    return text.to_string();
                }
            }
        }
    }
    if let Some(output) = body.get("output") {
        if let Some(text) = output
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|item| item.get("text"))
            .and_then(Value::as_str)
        {
            return text.to_string();
        }
    }
    String::new()
}
