//! MCP Protocol Implementation
//!
//! Manual implementation of Model Context Protocol (JSON-RPC 2.0 over stdio)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// JSON-RPC 2.0 Request (inbound only; responses are never parsed back)
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }
}

// MCP Protocol Types

/// Server capabilities
#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Serialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server info for initialize response
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Initialize result
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Tool definition
#[derive(Debug, Serialize, Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// List tools result
#[derive(Debug, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

/// Call tool request params (inbound)
#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<HashMap<String, Value>>,
}

/// Tool result content
#[derive(Debug, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Call tool result
#[derive(Debug, Serialize)]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    pub fn text(text: String) -> Self {
        Self {
            content: vec![TextContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            content: vec![TextContent {
                content_type: "text".to_string(),
                text: message,
            }],
            is_error: Some(true),
        }
    }
}

/// One parameter in a tool's input schema
pub struct SchemaParam {
    pub name: &'static str,
    pub param_type: &'static str,
    pub description: &'static str,
    pub required: bool,
}

impl SchemaParam {
    pub const fn new(
        name: &'static str,
        param_type: &'static str,
        description: &'static str,
        required: bool,
    ) -> Self {
        Self {
            name,
            param_type,
            description,
            required,
        }
    }
}

/// Create a JSON Schema for tool parameters
pub fn create_tool_schema(params: &[SchemaParam]) -> Value {
    let mut props = serde_json::Map::new();
    let mut required = Vec::new();

    for param in params {
        props.insert(
            param.name.to_string(),
            serde_json::json!({
                "type": param.param_type,
                "description": param.description
            }),
        );
        if param.required {
            required.push(param.name.to_string());
        }
    }

    serde_json::json!({
        "type": "object",
        "properties": props,
        "required": required
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tool_schema_typed_params() {
        let schema = create_tool_schema(&[
            SchemaParam::new("entity_set", "string", "Entity set to query", true),
            SchemaParam::new("top", "integer", "Row limit", false),
            SchemaParam::new("count", "boolean", "Include count", false),
        ]);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["entity_set"]["type"], "string");
        assert_eq!(schema["properties"]["top"]["type"], "integer");
        assert_eq!(schema["properties"]["count"]["type"], "boolean");
        assert_eq!(schema["required"], serde_json::json!(["entity_set"]));
    }

    #[test]
    fn test_response_serialization_omits_absent_fields() {
        let ok = JsonRpcResponse::success(Some(serde_json::json!(1)), serde_json::json!({}));
        let text = serde_json::to_string(&ok).unwrap();
        assert!(!text.contains("error"));

        let err = JsonRpcResponse::error(Some(serde_json::json!(2)), -1, "boom");
        let text = serde_json::to_string(&err).unwrap();
        assert!(!text.contains("result"));
        assert!(text.contains("\"code\":-1"));
    }
}
