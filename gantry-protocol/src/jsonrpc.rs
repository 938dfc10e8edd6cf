//! JSON-RPC 2.0 envelope types
//!
//! The gateway accepts a single JSON-RPC request per HTTP POST and replies
//! with a single response object. Notifications (requests without an `id`)
//! are acknowledged but never answered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC 2.0 version string
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Method name to call
    pub method: String,

    /// Method parameters (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Request ID for correlation (absent for notifications)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    /// Create a request with a numeric ID
    pub fn with_id(method: impl Into<String>, params: Option<Value>, id: i64) -> Self {
        Self::new(method, params, Some(Value::from(id)))
    }

    /// Create a notification (no ID, no response expected)
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(method, params, None)
    }

    /// Check if this is a notification
    pub fn is_notification(&self) -> bool {
        self.id.is_none() || self.method.starts_with("notifications/")
    }

    /// Borrow a params field by name, if params is an object
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(name))
    }
}

/// JSON-RPC 2.0 response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Successful result (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error information (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Request ID for correlation
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: Value, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(error: JsonRpcError, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Check if this response carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Additional error data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error object
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    /// `-32700`: invalid JSON was received
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError as i32, "Parse error", Some(Value::String(detail.into())))
    }

    /// `-32600`: the payload is not a valid request object
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidRequest as i32,
            "Invalid Request",
            Some(Value::String(detail.into())),
        )
    }

    /// `-32601`: unknown method
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound as i32,
            format!("Method not found: {}", method),
            None,
        )
    }

    /// `-32602`: params do not match the method schema
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidParams as i32,
            "Invalid params",
            Some(Value::String(detail.into())),
        )
    }

    /// `-32603`: gateway-internal failure; also used for policy denials with
    /// the denial reason as the message
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError as i32, message, None)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Standard JSON-RPC 2.0 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum JsonRpcErrorCode {
    /// Invalid JSON was received by the server
    ParseError = -32700,

    /// The JSON sent is not a valid Request object
    InvalidRequest = -32600,

    /// The method does not exist / is not available
    MethodNotFound = -32601,

    /// Invalid method parameter(s)
    InvalidParams = -32602,

    /// Internal JSON-RPC error
    InternalError = -32603,
}

impl JsonRpcErrorCode {
    /// Check if this is a reserved error (predefined by the JSON-RPC spec)
    pub fn is_reserved(code: i32) -> bool {
        (-32768..=-32000).contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_roundtrip() {
        let request = JsonRpcRequest::with_id("tools/list", Some(json!({"cursor": null})), 7);

        let serialized = serde_json::to_string(&request).unwrap();
        let deserialized: JsonRpcRequest = serde_json::from_str(&serialized).unwrap();

        assert_eq!(request, deserialized);
        assert_eq!(deserialized.method, "tools/list");
        assert!(!deserialized.is_notification());
    }

    #[test]
    fn notifications_have_no_id() {
        let n = JsonRpcRequest::notification("notifications/initialized", None);
        assert!(n.is_notification());
        assert!(n.id.is_none());

        // A notifications/* method is a notification even when the client
        // attaches an id.
        let n = JsonRpcRequest::with_id("notifications/cancelled", None, 1);
        assert!(n.is_notification());
    }

    #[test]
    fn error_response_shape() {
        let response =
            JsonRpcResponse::error(JsonRpcError::method_not_found("bogus/method"), Some(json!(3)));

        assert!(response.is_error());
        let err = response.error.unwrap();
        assert_eq!(err.code, -32601);
        assert!(err.message.contains("bogus/method"));
    }

    #[test]
    fn param_lookup() {
        let request = JsonRpcRequest::with_id(
            "tools/call",
            Some(json!({"name": "a__echo", "arguments": {"text": "hi"}})),
            1,
        );
        assert_eq!(request.param("name"), Some(&json!("a__echo")));
        assert_eq!(request.param("missing"), None);
    }

    #[test]
    fn reserved_error_codes() {
        assert!(JsonRpcErrorCode::is_reserved(-32700));
        assert!(JsonRpcErrorCode::is_reserved(-32000));
        assert!(!JsonRpcErrorCode::is_reserved(-31999));
    }
}
