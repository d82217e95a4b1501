//! Request/response transport to out-of-process tool handlers.
//!
//! The real deployment dispatches over whatever transport the registered
//! address names (HTTP, a message queue, a unix socket); this crate depends
//! only on the [`ToolTransport`] trait, with an in-memory fake for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn call(&self, address: &str, tool_name: &str, args: &Value) -> Result<Value, ToolError>;
}

/// `reqwest`-backed transport: POSTs the canonical JSON form of `args` to
/// the tool's registered HTTP address.
pub struct HttpToolTransport {
    client: reqwest::Client,
}

impl HttpToolTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpToolTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTransport for HttpToolTransport {
    async fn call(&self, address: &str, tool_name: &str, args: &Value) -> Result<Value, ToolError> {
        let resp = self
            .client
            .post(address)
            .json(args)
            .send()
            .await
            .map_err(|e| ToolError::Transport {
                tool: tool_name.to_string(),
                message: e.to_string(),
            })?;
        if !resp.status().is_success() {
            return Err(ToolError::Execution {
                tool: tool_name.to_string(),
                message: format!("upstream returned {}", resp.status()),
            });
        }
        resp.json::<Value>().await.map_err(|e| ToolError::Transport {
            tool: tool_name.to_string(),
            message: e.to_string(),
        })
    }
}

/// In-memory transport keyed by `(address, tool_name)` for tests.
#[derive(Default)]
pub struct InMemoryToolTransport {
    responses: Mutex<HashMap<(String, String), Result<Value, String>>>,
}

impl InMemoryToolTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, address: &str, tool_name: &str, response: Result<Value, String>) {
        let mut map = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        map.insert((address.to_string(), tool_name.to_string()), response);
    }
}

#[async_trait]
impl ToolTransport for InMemoryToolTransport {
    async fn call(&self, address: &str, tool_name: &str, _args: &Value) -> Result<Value, ToolError> {
        let map = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(&(address.to_string(), tool_name.to_string())) {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(message)) => Err(ToolError::Transport {
                tool: tool_name.to_string(),
                message: message.clone(),
            }),
            None => Err(ToolError::Transport {
                tool: tool_name.to_string(),
                message: "no stubbed response".to_string(),
            }),
        }
    }
}
