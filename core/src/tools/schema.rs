//! Tool descriptors loaded from an OpenAPI-shaped schema file at startup.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    /// Address of the out-of-process handler for this tool's RPC transport.
    pub address: String,
}

/// The schema file format: a top-level `tools` array of [`ToolDescriptor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchemaFile {
    pub tools: Vec<ToolDescriptor>,
}

pub fn validate_against(schema: &Value, value: &Value, tool: &str) -> Result<(), ToolError> {
    let compiled = jsonschema::JSONSchema::compile(schema).map_err(|e| ToolError::SchemaValidation {
        tool: tool.to_string(),
        message: format!("invalid schema: {e}"),
    })?;
    let result = compiled.validate(value);
    if let Err(errors) = result {
        let message = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        return Err(ToolError::SchemaValidation {
            tool: tool.to_string(),
            message,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_matching_value() {
        let schema = json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}});
        let value = json!({"name": "events"});
        assert!(validate_against(&schema, &value, "list_events").is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({"type": "object", "required": ["name"]});
        let value = json!({});
        assert!(validate_against(&schema, &value, "list_events").is_err());
    }
}
