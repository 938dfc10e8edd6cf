//! Upstream MCP sessions
//!
//! A session is one client-initiated JSON-RPC exchange: open the transport,
//! `initialize`, run a single operation, drop. Opening a fresh session per
//! operation removes cross-request interference and makes cancellation a
//! plain task drop.

use crate::credentials::AppliedAuth;
use crate::transport::{SseSession, StreamableHttpSession, TransportError};
use gantry_config::{TransportKind, UpstreamConfig};
use gantry_protocol::messages::{
    PromptsGetResult, PromptsListResult, ResourcesListResult, ResourcesReadResult, ToolsCallResult,
    ToolsListResult,
};
use gantry_protocol::JsonRpcRequest;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Session-level failures
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The upstream answered with a JSON-RPC error object
    #[error("upstream error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("malformed upstream payload: {0}")]
    Payload(String),
}

enum SessionTransport {
    Http(StreamableHttpSession),
    Sse(SseSession),
}

/// One initialized upstream MCP session
pub struct McpSession {
    transport: SessionTransport,
    next_id: i64,
    server_info: Value,
}

impl McpSession {
    /// Open the transport and complete the initialize handshake
    pub async fn open(
        client: reqwest::Client,
        upstream: &UpstreamConfig,
        auth: AppliedAuth,
    ) -> Result<Self, SessionError> {
        let transport = match upstream.transport {
            TransportKind::StreamableHttp => SessionTransport::Http(StreamableHttpSession::new(
                client,
                upstream.url.clone(),
                auth,
            )),
            TransportKind::Sse => {
                SessionTransport::Sse(SseSession::connect(client, upstream.url.clone(), auth).await?)
            }
        };

        let mut session = Self {
            transport,
            next_id: 1,
            server_info: Value::Null,
        };
        session.initialize().await?;
        Ok(session)
    }

    async fn initialize(&mut self) -> Result<(), SessionError> {
        let params = json!({
            "protocolVersion": gantry_protocol::MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "gantry-gateway",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = self.call("initialize", Some(params)).await?;
        debug!(
            server = %result.pointer("/serverInfo/name").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "upstream session initialized"
        );
        self.server_info = result;

        let initialized = JsonRpcRequest::notification("notifications/initialized", Some(json!({})));
        match &mut self.transport {
            SessionTransport::Http(t) => t.notify(&initialized).await?,
            SessionTransport::Sse(t) => t.notify(&initialized).await?,
        }
        Ok(())
    }

    /// Raw JSON-RPC call returning the `result` value
    pub async fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, SessionError> {
        let id = self.next_id;
        self.next_id += 1;
        let request = JsonRpcRequest::with_id(method, params, id);

        let response = match &mut self.transport {
            SessionTransport::Http(t) => t.request(&request).await?,
            SessionTransport::Sse(t) => t.request(&request).await?,
        };

        if let Some(error) = response.error {
            return Err(SessionError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, SessionError> {
        serde_json::from_value(value).map_err(|e| SessionError::Payload(format!("{}: {}", what, e)))
    }

    /// The upstream's `initialize` result
    pub fn server_info(&self) -> &Value {
        &self.server_info
    }

    pub async fn list_tools(&mut self) -> Result<ToolsListResult, SessionError> {
        let result = self.call("tools/list", None).await?;
        Self::parse(result, "tools/list result")
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolsCallResult, SessionError> {
        let params = json!({
            "name": name,
            "arguments": arguments.unwrap_or_else(|| json!({})),
        });
        let result = self.call("tools/call", Some(params)).await?;
        Self::parse(result, "tools/call result")
    }

    pub async fn list_resources(&mut self) -> Result<ResourcesListResult, SessionError> {
        let result = self.call("resources/list", None).await?;
        Self::parse(result, "resources/list result")
    }

    pub async fn read_resource(&mut self, uri: &str) -> Result<ResourcesReadResult, SessionError> {
        let result = self.call("resources/read", Some(json!({"uri": uri}))).await?;
        Self::parse(result, "resources/read result")
    }

    pub async fn list_prompts(&mut self) -> Result<PromptsListResult, SessionError> {
        let result = self.call("prompts/list", None).await?;
        Self::parse(result, "prompts/list result")
    }

    pub async fn get_prompt(
        &mut self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<PromptsGetResult, SessionError> {
        let mut params = json!({"name": name});
        if let Some(arguments) = arguments {
            params["arguments"] = arguments;
        }
        let result = self.call("prompts/get", Some(params)).await?;
        Self::parse(result, "prompts/get result")
    }
}
