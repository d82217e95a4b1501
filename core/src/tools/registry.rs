//! Tool registry: schema-validated invocation over the RPC transport, plus
//! model-backed tool identification from free-form user text.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::rpc::ToolTransport;
use super::schema::{validate_against, ToolDescriptor, ToolSchemaFile};
use crate::error::ToolError;
use crate::model::{Message, ModelClient};
use crate::resilience::RetryPolicy;

pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
    transport: Arc<dyn ToolTransport>,
    retry: RetryPolicy,
}

impl ToolRegistry {
    pub fn new(schema: ToolSchemaFile, transport: Arc<dyn ToolTransport>, retry: RetryPolicy) -> Self {
        let tools = schema.tools.into_iter().map(|t| (t.name.clone(), t)).collect();
        Self {
            tools,
            transport,
            retry,
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub async fn invoke(&self, tool_name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        validate_against(&tool.input_schema, &args, tool_name)?;

        let transport = Arc::clone(&self.transport);
        let address = tool.address.clone();
        let name = tool_name.to_string();
        let response = self
            .retry
            .run(|| {
                let transport = Arc::clone(&transport);
                let address = address.clone();
                let name = name.clone();
                let args = args.clone();
                async move { transport.call(&address, &name, &args).await }
            })
            .await?;

        validate_against(&tool.output_schema, &response, tool_name)?;
        Ok(response)
    }

    /// Builds a prompt enumerating available tools, asks the model which
    /// apply, and parses a JSON array of tool names from the reply.
    /// Unknown names are filtered out rather than erroring.
    pub async fn identify(&self, model: &ModelClient, user_text: &str) -> Vec<String> {
        let catalog: String = self
            .tools
            .values()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");

        let system_prompt = format!(
            "You select which tools, if any, are needed to answer the user's message.\n\
             Available tools:\n{catalog}\n\n\
             Respond with ONLY a JSON array of tool names that apply, e.g. [\"list_events\"]. \
             Respond with [] if none apply."
        );

        let result = model
            .generate(&[Message::user(user_text)], Some(&system_prompt), 128, 0.0)
            .await;

        parse_tool_names(&result.text)
            .into_iter()
            .filter(|name| self.tools.contains_key(name))
            .collect()
    }
}

fn parse_tool_names(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let start = trimmed.find('[');
    let end = trimmed.rfind(']');
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }
    serde_json::from_str::<Vec<String>>(&trimmed[start..=end]).unwrap_or_default()
}
