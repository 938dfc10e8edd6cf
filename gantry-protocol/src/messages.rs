//! MCP message and data types
//!
//! Mirrors the subset of the Model Context Protocol the gateway handles:
//! initialize, tool listing/calls, resources, and prompts. Field names follow
//! the MCP wire format (camelCase).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// MCP protocol revision the gateway advertises
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// === Initialize ===

/// Result of the `initialize` method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Server capabilities
    pub capabilities: ServerCapabilities,

    /// Server information
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Capability set advertised to clients
///
/// The `oauth` block is a gateway extension: when bearer authentication is
/// enabled it tells clients where to start the authorization-code flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: HashMap<String, Value>,
    pub resources: HashMap<String, Value>,
    pub prompts: HashMap<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OauthCapability>,
}

/// OAuth hints embedded in `initialize` and `GET /mcp` responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OauthCapability {
    #[serde(rename = "authorizationUrl")]
    pub authorization_url: String,

    #[serde(rename = "tokenUrl")]
    pub token_url: String,

    #[serde(rename = "clientId")]
    pub client_id: String,

    pub scopes: Vec<String>,
}

/// Server identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,

    /// Server version
    pub version: String,
}

// === Tools ===

/// Tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name
    pub name: String,

    /// Tool description
    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the tool arguments
    #[serde(rename = "inputSchema", default = "empty_object")]
    pub input_schema: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Result of `tools/list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// List of available tools
    pub tools: Vec<Tool>,
}

/// Parameters for `tools/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsCallParams {
    /// Tool name to call
    pub name: String,

    /// Tool arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsCallResult {
    /// Tool execution content parts
    pub content: Vec<ToolContent>,

    /// Whether the call failed on the tool side
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolsCallResult {
    /// Single text part, success
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Single text part flagged as an error
    pub fn error_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: true,
        }
    }
}

/// Content part returned by tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    #[serde(rename = "resource")]
    Resource { resource: Value },
}

// === Resources ===

/// Resource descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource URI
    pub uri: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Resource description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type, when known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Result of `resources/list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesListResult {
    pub resources: Vec<Resource>,
}

/// Result of `resources/read`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesReadResult {
    pub contents: Vec<ResourceContent>,
}

/// One piece of resource content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Base64 payload for binary resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,

    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

// === Prompts ===

/// Prompt descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Prompt name
    pub name: String,

    /// Prompt description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// Prompt argument declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,
}

/// Result of `prompts/list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptsListResult {
    pub prompts: Vec<Prompt>,
}

/// Result of `prompts/get`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptsGetResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub messages: Vec<PromptMessage>,
}

/// One templated message returned by `prompts/get`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_uses_wire_field_names() {
        let tool = Tool {
            name: "echo".to_string(),
            description: "Echo input".to_string(),
            input_schema: json!({"type": "object"}),
        };

        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["inputSchema"], json!({"type": "object"}));
        assert!(value.get("input_schema").is_none());
    }

    #[test]
    fn tool_defaults_tolerate_sparse_upstreams() {
        let tool: Tool = serde_json::from_value(json!({"name": "probe"})).unwrap();
        assert_eq!(tool.description, "");
        assert_eq!(tool.input_schema, json!({}));
    }

    #[test]
    fn content_parts_are_tagged() {
        let part = ToolContent::Text {
            text: "hello".to_string(),
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hello"}));

        let parsed: ToolContent = serde_json::from_value(json!({
            "type": "image",
            "data": "aGk=",
            "mimeType": "image/png"
        }))
        .unwrap();
        assert!(matches!(parsed, ToolContent::Image { .. }));
    }

    #[test]
    fn capabilities_omit_oauth_when_absent() {
        let caps = ServerCapabilities::default();
        let value = serde_json::to_value(&caps).unwrap();
        assert!(value.get("oauth").is_none());
        assert_eq!(value["tools"], json!({}));
    }

    #[test]
    fn call_result_helpers() {
        let ok = ToolsCallResult::text("done");
        assert!(!ok.is_error);

        let err = ToolsCallResult::error_text("boom");
        assert!(err.is_error);
        assert_eq!(err.content.len(), 1);
    }
}
