//! Model client: a single `generate` façade over the two wire dialects,
//! with the three-tier endpoint fallback ladder (inference profile →
//! cross-region profile → direct model id) and fallback-envelope synthesis
//! when every tier is exhausted. Grounded in `strand_client.py`'s
//! `_generate_with_fallback`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::dialect::{extract_text, Dialect, Role};
use crate::error::ModelError;
use crate::resilience::{CircuitRegistry, RetryPolicy};

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub text: String,
    pub token_usage: TokenUsage,
    pub model_id: String,
    pub is_fallback: bool,
}

const FALLBACK_APOLOGY: &str = "I apologize, but I'm currently experiencing technical \
difficulties connecting to the AI service. Please try again in a few moments. If the issue \
persists, please contact support.";

/// Transport boundary for invoking a specific model/endpoint identifier.
/// The real inference endpoint is out of scope for this core; production
/// code plugs in an HTTP transport while tests use an in-memory fake.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn invoke(&self, endpoint_id: &str, dialect: Dialect, body: Value) -> Result<Value, ModelError>;
}

/// `reqwest`-backed transport posting the dialect-shaped body to
/// `{base_url}/{endpoint_id}`.
pub struct HttpModelTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpModelTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ModelTransport for HttpModelTransport {
    async fn invoke(&self, endpoint_id: &str, _dialect: Dialect, body: Value) -> Result<Value, ModelError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint_id);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport {
                endpoint: endpoint_id.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::Throttled {
                endpoint: endpoint_id.to_string(),
                message: "rate limited".into(),
            });
        }
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ModelError::Permission {
                endpoint: endpoint_id.to_string(),
                message: status.to_string(),
            });
        }
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ModelError::Validation {
                endpoint: endpoint_id.to_string(),
                message: status.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ModelError::Transport {
                endpoint: endpoint_id.to_string(),
                message: status.to_string(),
            });
        }

        resp.json::<Value>().await.map_err(|e| ModelError::Transport {
            endpoint: endpoint_id.to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModelEndpointConfig {
    pub inference_profile: Option<String>,
    pub cross_region_profile: Option<String>,
    pub direct_model_id: String,
}

impl ModelEndpointConfig {
    /// Priority-ordered tiers: explicit profile → cross-region profile →
    /// direct model id.
    pub fn ladder(&self) -> Vec<String> {
        let mut tiers = Vec::with_capacity(3);
        if let Some(p) = &self.inference_profile {
            tiers.push(p.clone());
        }
        if let Some(p) = &self.cross_region_profile {
            tiers.push(p.clone());
        }
        tiers.push(self.direct_model_id.clone());
        tiers
    }
}

pub struct ModelClient {
    transport: Arc<dyn ModelTransport>,
    circuits: Arc<CircuitRegistry>,
    retry: RetryPolicy,
    endpoints: ModelEndpointConfig,
}

impl ModelClient {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        circuits: Arc<CircuitRegistry>,
        retry: RetryPolicy,
        endpoints: ModelEndpointConfig,
    ) -> Self {
        Self {
            transport,
            circuits,
            retry,
            endpoints,
        }
    }

    pub async fn generate(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> GenerateResult {
        let ladder = self.endpoints.ladder();
        let mut last_error = String::new();

        for endpoint_id in &ladder {
            let service_key = format!("model:{endpoint_id}");
            if !self.circuits.is_available(&service_key) {
                last_error = format!("{endpoint_id}: circuit open");
                continue;
            }

            let dialect = Dialect::detect(endpoint_id);
            let body = dialect.build_request(messages, system_prompt, max_tokens, temperature);
            let start = Instant::now();

            let transport = Arc::clone(&self.transport);
            let endpoint_for_closure = endpoint_id.clone();
            let result = self
                .retry
                .run(|| {
                    let transport = Arc::clone(&transport);
                    let endpoint_id = endpoint_for_closure.clone();
                    let body = body.clone();
                    async move { transport.invoke(&endpoint_id, dialect, body).await }
                })
                .await;

            match result {
                Ok(response_body) => {
                    self.circuits.record_success(&service_key);
                    let text = extract_text(&response_body);
                    let usage = TokenUsage {
                        input_tokens: response_body
                            .get("usage")
                            .and_then(|u| u.get("input_tokens"))
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as u32,
                        output_tokens: response_body
                            .get("usage")
                            .and_then(|u| u.get("output_tokens"))
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as u32,
                    };
                    tracing::debug!(
                        endpoint = %endpoint_id,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "model generate succeeded"
                    );
                    return GenerateResult {
                        text,
                        token_usage: usage,
                        model_id: endpoint_id.clone(),
                        is_fallback: false,
                    };
                }
                Err(err) => {
                    self.circuits.record_failure(&service_key);
                    last_error = format!("{endpoint_id}: {err}");
                    tracing::warn!(endpoint = %endpoint_id, error = %err, "model endpoint failed, demoting");
                }
            }
        }

        tracing::error!(last_error = %last_error, "all model endpoint tiers exhausted");
        GenerateResult {
            text: FALLBACK_APOLOGY.to_string(),
            token_usage: TokenUsage::default(),
            model_id: "fallback".to_string(),
            is_fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedTransport {
        responses: Vec<Result<Value, ModelError>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelTransport for ScriptedTransport {
        async fn invoke(&self, endpoint_id: &str, _d: Dialect, _b: Value) -> Result<Value, ModelError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(idx)
                .cloned()
                .unwrap_or_else(|| Err(ModelError::Transport {
                    endpoint: endpoint_id.to_string(),
                    message: "exhausted script".into(),
                }))
        }
    }

    impl Clone for ModelError {
        fn clone(&self) -> Self {
            match self {
                ModelError::Validation { endpoint, message } => ModelError::Validation {
                    endpoint: endpoint.clone(),
                    message: message.clone(),
                },
                ModelError::Permission { endpoint, message } => ModelError::Permission {
                    endpoint: endpoint.clone(),
                    message: message.clone(),
                },
                ModelError::Throttled { endpoint, message } => ModelError::Throttled {
                    endpoint: endpoint.clone(),
                    message: message.clone(),
                },
                ModelError::Transport { endpoint, message } => ModelError::Transport {
                    endpoint: endpoint.clone(),
                    message: message.clone(),
                },
                ModelError::AllTiersExhausted(s) => ModelError::AllTiersExhausted(s.clone()),
            }
        }
    }

    fn endpoints() -> ModelEndpointConfig {
        ModelEndpointConfig {
            inference_profile: Some("profile-a".into()),
            cross_region_profile: Some("profile-b".into()),
            direct_model_id: "direct-model".into(),
        }
    }

    #[tokio::test]
    async fn generate_succeeds_on_first_tier() {
        let transport = Arc::new(ScriptedTransport {
            responses: vec![Ok(json!({"content": [{"text": "hello"}]}))],
            calls: AtomicUsize::new(0),
        });
        let client = ModelClient::new(
            transport,
            Arc::new(CircuitRegistry::for_service_defaults()),
            RetryPolicy::new(1, std::time::Duration::from_millis(1), std::time::Duration::from_millis(1)),
            endpoints(),
        );
        let result = client
            .generate(&[Message::user("hi")], None, 100, 0.5)
            .await;
        assert_eq!(result.text, "hello");
        assert!(!result.is_fallback);
        assert_eq!(result.model_id, "profile-a");
    }

    #[tokio::test]
    async fn validation_error_demotes_to_next_tier() {
        let transport = Arc::new(ScriptedTransport {
            responses: vec![
                Err(ModelError::Validation {
                    endpoint: "profile-a".into(),
                    message: "bad model id".into(),
                }),
                Ok(json!({"content": [{"text": "from cross region"}]})),
            ],
            calls: AtomicUsize::new(0),
        });
        let client = ModelClient::new(
            transport,
            Arc::new(CircuitRegistry::for_service_defaults()),
            RetryPolicy::new(1, std::time::Duration::from_millis(1), std::time::Duration::from_millis(1)),
            endpoints(),
        );
        let result = client
            .generate(&[Message::user("hi")], None, 100, 0.5)
            .await;
        assert_eq!(result.text, "from cross region");
        assert_eq!(result.model_id, "profile-b");
    }

    #[tokio::test]
    async fn all_tiers_exhausted_yields_fallback_envelope() {
        let transport = Arc::new(ScriptedTransport {
            responses: vec![
                Err(ModelError::Validation { endpoint: "profile-a".into(), message: "x".into() }),
                Err(ModelError::Validation { endpoint: "profile-b".into(), message: "x".into() }),
                Err(ModelError::Validation { endpoint: "direct-model".into(), message: "x".into() }),
            ],
            calls: AtomicUsize::new(0),
        });
        let client = ModelClient::new(
            transport,
            Arc::new(CircuitRegistry::for_service_defaults()),
            RetryPolicy::new(1, std::time::Duration::from_millis(1), std::time::Duration::from_millis(1)),
            endpoints(),
        );
        let result = client
            .generate(&[Message::user("hi")], None, 100, 0.5)
            .await;
        assert!(result.is_fallback);
        assert!(result.text.contains("apologize"));
    }
}
