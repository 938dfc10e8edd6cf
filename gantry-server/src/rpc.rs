//! JSON-RPC front end
//!
//! Terminates the client side of the MCP protocol on `POST /mcp`. One request
//! per POST; notifications are acknowledged with an empty body. Protocol
//! errors use the standard JSON-RPC codes over HTTP 200; only a missing or
//! invalid bearer produces a real HTTP 401, carrying the OAuth challenge.

use crate::aggregator;
use crate::error::RpcFailure;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_audit::EventStatus;
use gantry_auth::{build_challenge, extract_bearer_token, AuthError, Subject};
use gantry_protocol::messages::{InitializeResult, ServerCapabilities, ServerInfo};
use gantry_protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Gateway identity advertised in `initialize`
fn server_info() -> ServerInfo {
    ServerInfo {
        name: "gantry-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Capabilities document, with OAuth hints when auth is on
pub fn capabilities(ctx: &AppState) -> ServerCapabilities {
    let mut caps = ServerCapabilities::default();
    if ctx.auth_enabled() {
        caps.oauth = Some(gantry_auth::oauth_capability(&ctx.config.auth));
    }
    caps
}

/// The `initialize` result, shared by POST initialize and GET discovery
pub fn initialize_result(ctx: &AppState) -> InitializeResult {
    InitializeResult {
        protocol_version: gantry_protocol::MCP_PROTOCOL_VERSION.to_string(),
        capabilities: capabilities(ctx),
        server_info: server_info(),
    }
}

/// `GET /mcp`: discovery document so clients can inspect OAuth settings
pub async fn mcp_get_handler(State(ctx): State<AppState>) -> Json<InitializeResult> {
    Json(initialize_result(&ctx))
}

/// `POST /mcp`: the JSON-RPC endpoint
pub async fn mcp_post_handler(State(ctx): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    // Parse the envelope by hand so malformed JSON maps to -32700 instead of
    // an HTTP-level rejection.
    let request: JsonRpcRequest = match serde_json::from_slice::<Value>(&body)
        .map_err(|e| JsonRpcError::parse_error(e.to_string()))
        .and_then(|value| {
            serde_json::from_value(value).map_err(|e| JsonRpcError::invalid_request(e.to_string()))
        }) {
        Ok(request) => request,
        Err(error) => {
            return Json(JsonRpcResponse::error(error, None)).into_response();
        }
    };

    let id = request.id.clone();
    let method = request.method.clone();
    debug!(method = %method, "MCP RPC request");

    let is_notification = method.starts_with("notifications/");

    // `initialize` and notifications never require a token: that is how a
    // client discovers the OAuth configuration in the first place.
    let subject = if ctx.auth_enabled() && method != "initialize" && !is_notification {
        match authenticate(&ctx, &headers).await {
            Ok(subject) => subject,
            Err(response) => return response,
        }
    } else {
        Subject::anonymous()
    };

    if is_notification {
        debug!(method = %method, "acknowledged notification");
        return Json(json!({})).into_response();
    }

    // If the client aborts, axum drops this future mid-dispatch; the guard
    // records the abandonment so the audit trail stays complete.
    let mut guard = CancellationGuard::armed(&ctx, &subject.display_name, &method);
    let outcome = dispatch(&ctx, &subject, &request).await;
    guard.disarm();

    let envelope = match outcome {
        Ok(result) => JsonRpcResponse::success(result, id),
        Err(failure) => JsonRpcResponse::error(failure.to_rpc_error(), id),
    };
    Json(envelope).into_response()
}

/// Records a `client_cancelled` audit event when dropped before completion
struct CancellationGuard {
    audit: std::sync::Arc<gantry_audit::AuditLogger>,
    subject: String,
    method: String,
    armed: bool,
}

impl CancellationGuard {
    fn armed(ctx: &AppState, subject: &str, method: &str) -> Self {
        Self {
            audit: ctx.audit.clone(),
            subject: subject.to_string(),
            method: method.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let audit = self.audit.clone();
        let event = gantry_audit::AuditEvent::new(
            gantry_audit::EventType::McpRequest,
            self.subject.clone(),
            self.method.clone(),
        )
        .with_status(EventStatus::Error)
        .with_error("client_cancelled");

        // The handler future is being dropped; finish the write elsewhere.
        tokio::spawn(async move {
            audit.record(event).await;
        });
    }
}

/// Subject for surfaces that follow the global auth switch
pub(crate) async fn require_subject(ctx: &AppState, headers: &HeaderMap) -> Result<Subject, Response> {
    if !ctx.auth_enabled() {
        return Ok(Subject::anonymous());
    }
    authenticate(ctx, headers).await
}

/// Verify the bearer token or produce the 401/403 response
async fn authenticate(ctx: &AppState, headers: &HeaderMap) -> Result<Subject, Response> {
    let verifier = ctx.verifier.as_ref().expect("auth enabled implies verifier");
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let result = match extract_bearer_token(authorization) {
        Ok(token) => verifier.verify(token).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(subject) => {
            info!(subject = %subject.display_name, "authenticated MCP request");
            Ok(subject)
        }
        Err(e) => {
            warn!(error = %e, "MCP authentication failed");
            ctx.audit
                .authentication(None, EventStatus::Error, Some(&e.to_string()))
                .await;
            Err(auth_error_response(ctx, &e))
        }
    }
}

/// 401 with the OAuth challenge, 403 for missing scopes, 500 for JWKS outages
pub fn auth_error_response(ctx: &AppState, error: &AuthError) -> Response {
    match error.http_status() {
        403 => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "insufficient_scope",
                "error_description": error.to_string(),
            })),
        )
            .into_response(),
        500 => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "server_error",
                "error_description": error.to_string(),
            })),
        )
            .into_response(),
        _ => {
            let challenge = build_challenge(&ctx.config.auth, "invalid_token", &error.to_string());
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, challenge.www_authenticate.clone())],
                Json(challenge.body),
            )
                .into_response()
        }
    }
}

/// Method dispatch table
async fn dispatch(ctx: &AppState, subject: &Subject, request: &JsonRpcRequest) -> Result<Value, RpcFailure> {
    match request.method.as_str() {
        "initialize" => Ok(serde_json::to_value(initialize_result(ctx)).expect("initialize serializes")),

        "tools/list" => {
            let result = aggregator::list_tools(ctx, subject).await;
            Ok(serde_json::to_value(result).expect("tools serialize"))
        }

        "tools/call" => {
            let name = request
                .param("name")
                .and_then(Value::as_str)
                .ok_or_else(|| RpcFailure::InvalidParams("tools/call requires a 'name'".to_string()))?
                .to_string();
            let arguments = request.param("arguments").cloned().unwrap_or_else(|| json!({}));

            let result = aggregator::call_tool(ctx, subject, &name, arguments).await?;
            Ok(serde_json::to_value(result).expect("call result serializes"))
        }

        "resources/list" => {
            let result = aggregator::list_resources(ctx, subject).await;
            Ok(serde_json::to_value(result).expect("resources serialize"))
        }

        "resources/read" => {
            let uri = request
                .param("uri")
                .and_then(Value::as_str)
                .ok_or_else(|| RpcFailure::InvalidParams("resources/read requires a 'uri'".to_string()))?;

            let result = aggregator::read_resource(ctx, subject, uri).await;
            Ok(serde_json::to_value(result).expect("resource content serializes"))
        }

        "prompts/list" => {
            let result = aggregator::list_prompts(ctx, subject).await;
            Ok(serde_json::to_value(result).expect("prompts serialize"))
        }

        "prompts/get" => {
            let name = request
                .param("name")
                .and_then(Value::as_str)
                .ok_or_else(|| RpcFailure::InvalidParams("prompts/get requires a 'name'".to_string()))?;
            let arguments = request.param("arguments").cloned();

            let result = aggregator::get_prompt(ctx, subject, name, arguments).await;
            Ok(serde_json::to_value(result).expect("prompt serializes"))
        }

        other => Err(RpcFailure::MethodNotFound(other.to_string())),
    }
}
