//! Proxy error taxonomy
//!
//! Every failure a gateway operation can surface maps onto one of these
//! kinds. They are returned inside responses as upstream errors rather than
//! taking down the whole client request.

use thiserror::Error;

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Upstream proxy errors, by recovery policy
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Upstream absent from the registry
    #[error("MCP server '{server}' is not configured")]
    NotConfigured { server: String },

    /// Upstream present but its enable flag is off
    #[error("MCP server '{server}' is disabled")]
    Disabled { server: String },

    /// Credential reference could not be materialised
    #[error("credential for '{server}' could not be resolved: {detail}")]
    CredentialUnresolved { server: String, detail: String },

    /// Stream or connection closed before a response arrived
    #[error("transport to '{server}' broke: {detail}")]
    TransportBroken { server: String, detail: String },

    /// The upstream answered with a JSON-RPC error object
    #[error("upstream '{server}' returned error {code}: {message}")]
    Upstream {
        server: String,
        code: i32,
        message: String,
    },

    /// Session exceeded its allowed wall time
    #[error("request to '{server}' timed out after {seconds}s")]
    Timeout { server: String, seconds: u64 },

    /// Broadcast target selection produced an empty set
    #[error("no MCP servers available for broadcast")]
    NoTargets,

    /// The caller-side request was malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    /// Stable kind string recorded in audit events
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::NotConfigured { .. } => "not_configured",
            ProxyError::Disabled { .. } => "disabled",
            ProxyError::CredentialUnresolved { .. } => "credential_unresolved",
            ProxyError::TransportBroken { .. } => "transport_broken",
            ProxyError::Upstream { .. } => "upstream_error",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::NoTargets => "no_targets",
            ProxyError::InvalidRequest(_) => "invalid_request",
        }
    }
}
