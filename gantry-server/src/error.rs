//! Gateway-side failure types
//!
//! `RpcFailure` is what dispatch returns when a request cannot produce a
//! normal result; the front end turns it into a JSON-RPC error object.
//! `ApiError` is the REST surface's HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_protocol::JsonRpcError;
use gantry_proxy::ProxyError;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced through the JSON-RPC envelope
#[derive(Debug, Error)]
pub enum RpcFailure {
    /// Authenticated but denied by policy; carries the reason
    #[error("{0}")]
    Forbidden(String),

    /// Request params did not match the method schema
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Unknown JSON-RPC method
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Anything else that went wrong inside the gateway
    #[error("{0}")]
    Internal(String),
}

impl RpcFailure {
    /// Map a proxy failure onto the JSON-RPC surface
    pub fn from_proxy(error: ProxyError) -> Self {
        RpcFailure::Internal(error.to_string())
    }

    /// The JSON-RPC error object for this failure
    pub fn to_rpc_error(&self) -> JsonRpcError {
        match self {
            // Authorization failures keep HTTP 200 and carry the reason in
            // the error message, per the MCP JSON-RPC contract.
            RpcFailure::Forbidden(reason) => JsonRpcError::internal_error(reason.clone()),
            RpcFailure::InvalidParams(detail) => JsonRpcError::invalid_params(detail.clone()),
            RpcFailure::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            RpcFailure::Internal(message) => JsonRpcError::internal_error(message.clone()),
        }
    }
}

/// REST surface errors with an HTTP status
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        match &error {
            ProxyError::NotConfigured { .. } => ApiError::NotFound(error.to_string()),
            ProxyError::Disabled { .. } | ProxyError::InvalidRequest(_) | ProxyError::NoTargets => {
                ApiError::BadRequest(error.to_string())
            }
            _ => ApiError::Upstream(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_internal_error_code() {
        let failure = RpcFailure::Forbidden("denied by rule: lockdown".to_string());
        let error = failure.to_rpc_error();
        assert_eq!(error.code, -32603);
        assert!(error.message.contains("denied by rule"));
    }

    #[test]
    fn proxy_errors_keep_their_detail() {
        let failure = RpcFailure::from_proxy(ProxyError::NoTargets);
        assert!(failure.to_rpc_error().message.contains("no MCP servers"));
    }

    #[test]
    fn api_error_statuses() {
        assert_eq!(
            ApiError::from(ProxyError::NotConfigured { server: "x".into() }).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ProxyError::Timeout { server: "x".into(), seconds: 5 }).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
