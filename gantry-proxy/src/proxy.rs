//! The upstream proxy engine
//!
//! Owns outbound MCP traffic. Every operation takes a registry snapshot,
//! resolves the upstream's credentials, runs one session under the upstream's
//! timeout, and records an audit event with the outcome.

use crate::credentials::AppliedAuth;
use crate::error::{ProxyError, ProxyResult};
use crate::session::{McpSession, SessionError};
use crate::transport::TransportError;
use gantry_audit::{AuditEvent, AuditLogger, EventStatus, EventType};
use gantry_config::{ProxyConfig, UpstreamConfig, UpstreamRegistry, UpstreamSnapshot};
use gantry_protocol::messages::{
    PromptsGetResult, PromptsListResult, ResourcesListResult, ResourcesReadResult, ToolsCallResult,
    ToolsListResult,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Proxy engine for forwarding requests to upstream MCP servers
pub struct McpProxy {
    registry: Arc<UpstreamRegistry>,
    defaults: ProxyConfig,
    audit: Arc<AuditLogger>,
    client: reqwest::Client,
}

impl McpProxy {
    /// Build the proxy over a registry and audit logger
    pub fn new(registry: Arc<UpstreamRegistry>, defaults: ProxyConfig, audit: Arc<AuditLogger>) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(defaults.max_connections_per_host)
            .danger_accept_invalid_certs(!defaults.verify_ssl)
            .build()
            .unwrap_or_default();

        Self {
            registry,
            defaults,
            audit,
            client,
        }
    }

    /// Registry snapshot for this request
    pub fn snapshot(&self) -> UpstreamSnapshot {
        self.registry.snapshot()
    }

    /// Default per-session timeout
    pub fn default_timeout(&self) -> Duration {
        self.defaults.timeout_duration()
    }

    /// The audit logger this proxy records to
    pub fn audit_logger(&self) -> &AuditLogger {
        &self.audit
    }

    /// Look up an upstream, rejecting unknown and disabled servers
    fn upstream(&self, snapshot: &UpstreamSnapshot, server: &str) -> ProxyResult<UpstreamConfig> {
        let upstream = snapshot.get(server).cloned().ok_or_else(|| ProxyError::NotConfigured {
            server: server.to_string(),
        })?;
        if !upstream.enabled {
            return Err(ProxyError::Disabled {
                server: server.to_string(),
            });
        }
        Ok(upstream)
    }

    /// Run `op` inside one fresh session, bounded by the upstream timeout
    async fn with_session<T, F, Fut>(&self, server: &str, upstream: &UpstreamConfig, op: F) -> ProxyResult<T>
    where
        F: FnOnce(McpSession) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let auth =
            AppliedAuth::from_spec(upstream.auth.as_ref()).map_err(|e| ProxyError::CredentialUnresolved {
                server: server.to_string(),
                detail: e.to_string(),
            })?;

        let timeout = upstream.timeout_or(self.defaults.timeout_duration());
        let session_future = async {
            let session = McpSession::open(self.client.clone(), upstream, auth).await?;
            op(session).await
        };

        match tokio::time::timeout(timeout, session_future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.map_session_error(server, e)),
            Err(_) => Err(ProxyError::Timeout {
                server: server.to_string(),
                seconds: timeout.as_secs(),
            }),
        }
    }

    fn map_session_error(&self, server: &str, error: SessionError) -> ProxyError {
        match error {
            SessionError::Rpc { code, message } => ProxyError::Upstream {
                server: server.to_string(),
                code,
                message,
            },
            SessionError::Transport(TransportError::Broken(detail)) => {
                // A broken stream usually means the upstream process died
                // mid-request; say so in the log for the operator.
                error!(
                    server,
                    detail, "upstream stream broke; the MCP server may have crashed or restarted"
                );
                ProxyError::TransportBroken {
                    server: server.to_string(),
                    detail,
                }
            }
            SessionError::Transport(TransportError::Connect(detail)) => ProxyError::TransportBroken {
                server: server.to_string(),
                detail,
            },
            SessionError::Transport(TransportError::Status { status }) => ProxyError::Upstream {
                server: server.to_string(),
                code: -32000,
                message: format!("upstream returned HTTP {}", status),
            },
            SessionError::Transport(TransportError::Protocol(detail)) => ProxyError::TransportBroken {
                server: server.to_string(),
                detail,
            },
            SessionError::Payload(detail) => ProxyError::Upstream {
                server: server.to_string(),
                code: -32000,
                message: detail,
            },
        }
    }

    async fn audited<T, F>(
        &self,
        server: &str,
        subject: &str,
        action: &'static str,
        tool: Option<&str>,
        parameters: Option<Value>,
        run: F,
    ) -> ProxyResult<T>
    where
        F: Future<Output = ProxyResult<T>>,
    {
        let started = Instant::now();
        let result = run.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut event = AuditEvent::new(EventType::McpRequest, subject, action)
            .with_server(server)
            .with_duration_ms(duration_ms);
        if let Some(tool) = tool {
            event = event.with_tool(tool);
        }
        if let Some(parameters) = parameters {
            event = event.with_parameters(parameters);
        }
        event = match &result {
            Ok(_) => event.with_status(EventStatus::Success),
            Err(e) => event
                .with_status(EventStatus::Error)
                .with_error(format!("{}: {}", e.kind(), e)),
        };
        self.audit.record(event).await;

        result
    }

    /// List tools from one upstream
    pub async fn list_tools(&self, server: &str, subject: &str) -> ProxyResult<ToolsListResult> {
        let snapshot = self.snapshot();
        self.audited(server, subject, "list_tools", None, None, async {
            let upstream = self.upstream(&snapshot, server)?;
            self.with_session(server, &upstream, |mut s| async move { s.list_tools().await })
                .await
        })
        .await
    }

    /// Invoke one tool on one upstream
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        subject: &str,
        arguments: Option<Value>,
    ) -> ProxyResult<ToolsCallResult> {
        let snapshot = self.snapshot();
        let audit_params = arguments.clone().map(|a| json!({"arguments": a}));
        self.audited(server, subject, "invoke_tool", Some(tool), audit_params, async {
            let upstream = self.upstream(&snapshot, server)?;
            self.with_session(server, &upstream, |mut s| async move { s.call_tool(tool, arguments).await })
                .await
        })
        .await
    }

    /// List resources from one upstream
    pub async fn list_resources(&self, server: &str, subject: &str) -> ProxyResult<ResourcesListResult> {
        let snapshot = self.snapshot();
        self.audited(server, subject, "list_resources", None, None, async {
            let upstream = self.upstream(&snapshot, server)?;
            self.with_session(server, &upstream, |mut s| async move { s.list_resources().await })
                .await
        })
        .await
    }

    /// Read one resource from one upstream
    pub async fn read_resource(
        &self,
        server: &str,
        uri: &str,
        subject: &str,
    ) -> ProxyResult<ResourcesReadResult> {
        let snapshot = self.snapshot();
        let params = Some(json!({"uri": uri}));
        self.audited(server, subject, "read_resource", None, params, async {
            let upstream = self.upstream(&snapshot, server)?;
            self.with_session(server, &upstream, |mut s| async move { s.read_resource(uri).await })
                .await
        })
        .await
    }

    /// List prompts from one upstream
    pub async fn list_prompts(&self, server: &str, subject: &str) -> ProxyResult<PromptsListResult> {
        let snapshot = self.snapshot();
        self.audited(server, subject, "list_prompts", None, None, async {
            let upstream = self.upstream(&snapshot, server)?;
            self.with_session(server, &upstream, |mut s| async move { s.list_prompts().await })
                .await
        })
        .await
    }

    /// Fetch one prompt from one upstream
    pub async fn get_prompt(
        &self,
        server: &str,
        prompt: &str,
        subject: &str,
        arguments: Option<Value>,
    ) -> ProxyResult<PromptsGetResult> {
        let snapshot = self.snapshot();
        self.audited(server, subject, "get_prompt", Some(prompt), None, async {
            let upstream = self.upstream(&snapshot, server)?;
            self.with_session(server, &upstream, |mut s| async move { s.get_prompt(prompt, arguments).await })
                .await
        })
        .await
    }

    /// Session-level info about one upstream: config plus its initialize result
    pub async fn server_info(&self, server: &str, subject: &str) -> ProxyResult<Value> {
        let snapshot = self.snapshot();
        self.audited(server, subject, "get_server_info", None, None, async {
            let upstream = self.upstream(&snapshot, server)?;
            let info = self
                .with_session(server, &upstream, |s| async move { Ok(s.server_info().clone()) })
                .await?;
            Ok(json!({
                "name": server,
                "url": upstream.url,
                "transport": upstream.transport,
                "enabled": upstream.enabled,
                "tags": upstream.tags,
                "tools": upstream.tools,
                "serverInfo": info,
            }))
        })
        .await
    }
}

/// Log line helper shared with the broadcast engine
pub(crate) fn describe_failure(server: &str, error: &ProxyError) {
    match error {
        ProxyError::Timeout { .. } => warn!(server, error = %error, "upstream call timed out"),
        ProxyError::TransportBroken { .. } => warn!(server, error = %error, "upstream transport broke"),
        _ => info!(server, error = %error, "upstream call failed"),
    }
}
