//! REST and admin surface
//!
//! A thin HTTP mirror of the MCP operations plus read-only admin views.
//! Bearer-protected whenever authentication is enabled; `/health` and
//! `/config` stay open for liveness probes and non-secret inspection.

use crate::error::ApiError;
use crate::rpc::require_subject;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_policy::resource_id;
use gantry_proxy::BroadcastResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct ServerQuery {
    /// Upstream server name
    pub mcp_server: String,
}

#[derive(Debug, Deserialize)]
pub struct InvokeToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct InvokeToolResponse {
    pub success: bool,
    pub tool_name: String,
    pub mcp_server: String,
    pub result: Value,
}

#[derive(Debug, Deserialize)]
pub struct InvokeBroadcastRequest {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub mcp_servers: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// `GET /health`
pub async fn health(State(ctx): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "servers": ctx.registry.names().len(),
        "auth_enabled": ctx.auth_enabled(),
    }))
}

/// `GET /config`: the non-secret configuration view
pub async fn config_view(State(ctx): State<AppState>) -> Json<Value> {
    let auth = &ctx.config.auth;
    Json(json!({
        "gateway": {
            "host": ctx.config.gateway.host,
            "port": ctx.config.gateway.port,
            "mcp_servers_file": ctx.config.gateway.mcp_servers_file,
            "policy_file": ctx.config.gateway.policy_file,
        },
        "auth": {
            "enabled": auth.enabled,
            "issuer": auth.issuer(),
            "resource_server_url": auth.resource_server_url,
            "required_scopes": auth.required_scope_list(),
            "jwt_algorithm": auth.jwt_algorithm,
        },
        "proxy": {
            "timeout": ctx.config.proxy.timeout,
            "verify_ssl": ctx.config.proxy.verify_ssl,
        },
        "audit": {
            "log_file": ctx.config.audit.log_file,
            "to_stdout": ctx.config.audit.to_stdout,
        },
    }))
}

/// `GET /mcp/servers`: every configured upstream, credentials elided
pub async fn list_servers(State(ctx): State<AppState>, headers: HeaderMap) -> Response {
    let _subject = match require_subject(&ctx, &headers).await {
        Ok(subject) => subject,
        Err(response) => return response,
    };

    let snapshot = ctx.registry.snapshot();
    let servers: Vec<Value> = snapshot
        .iter()
        .map(|(name, upstream)| {
            json!({
                "name": name,
                "url": upstream.url,
                "type": upstream.transport,
                "enabled": upstream.enabled,
                "timeout": upstream.timeout,
                "description": upstream.description,
                "tags": upstream.tags,
                "tools": upstream.tools,
                "auth_configured": upstream.auth.is_some(),
            })
        })
        .collect();

    let count = servers.len();
    Json(json!({ "servers": servers, "count": count })).into_response()
}

/// `GET /mcp/server/{name}/info`: live info from one upstream
pub async fn server_info(
    State(ctx): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let subject = match require_subject(&ctx, &headers).await {
        Ok(subject) => subject,
        Err(response) => return response,
    };

    match ctx.proxy.server_info(&name, &subject.display_name).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// `GET /mcp/list-tools?mcp_server=...`
pub async fn list_tools(
    State(ctx): State<AppState>,
    Query(query): Query<ServerQuery>,
    headers: HeaderMap,
) -> Response {
    let subject = match require_subject(&ctx, &headers).await {
        Ok(subject) => subject,
        Err(response) => return response,
    };

    match ctx.proxy.list_tools(&query.mcp_server, &subject.display_name).await {
        Ok(result) => Json(json!({
            "mcp_server": query.mcp_server,
            "count": result.tools.len(),
            "tools": result.tools,
        }))
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// `POST /mcp/invoke?mcp_server=...`: invoke one tool on one upstream
pub async fn invoke_tool(
    State(ctx): State<AppState>,
    Query(query): Query<ServerQuery>,
    headers: HeaderMap,
    Json(request): Json<InvokeToolRequest>,
) -> Response {
    let subject = match require_subject(&ctx, &headers).await {
        Ok(subject) => subject,
        Err(response) => return response,
    };

    let resource = resource_id(&query.mcp_server, &request.tool_name);
    let decision = ctx.policy.check_permission(
        &subject.display_name,
        &subject.group_list(),
        &resource,
        "invoke_tool",
    );
    if !decision.allowed {
        ctx.audit
            .policy_violation(
                &subject.display_name,
                "invoke_tool",
                Some(&query.mcp_server),
                Some(&request.tool_name),
                &decision.reason,
            )
            .await;
        return ApiError::Forbidden(decision.reason).into_response();
    }

    match ctx
        .proxy
        .call_tool(
            &query.mcp_server,
            &request.tool_name,
            &subject.display_name,
            request.parameters,
        )
        .await
    {
        Ok(result) => Json(InvokeToolResponse {
            success: !result.is_error,
            tool_name: request.tool_name,
            mcp_server: query.mcp_server,
            result: serde_json::to_value(result).unwrap_or(Value::Null),
        })
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// `POST /mcp/invoke-broadcast`: fan a tool call out over REST
pub async fn invoke_broadcast(
    State(ctx): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InvokeBroadcastRequest>,
) -> Response {
    let subject = match require_subject(&ctx, &headers).await {
        Ok(subject) => subject,
        Err(response) => return response,
    };

    debug!(tool = %request.tool_name, "REST broadcast requested");
    let outcome: Result<BroadcastResult, _> = ctx
        .proxy
        .invoke_tool_broadcast(
            &request.tool_name,
            &subject.display_name,
            request.parameters,
            request.mcp_servers.as_deref(),
            request.tags.as_deref(),
        )
        .await;

    match outcome {
        Ok(broadcast) => Json(broadcast).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// `GET /tools`: legacy listing of the aggregated virtual tools
pub async fn legacy_list_tools(State(ctx): State<AppState>, headers: HeaderMap) -> Response {
    let subject = match require_subject(&ctx, &headers).await {
        Ok(subject) => subject,
        Err(response) => return response,
    };

    let result = crate::aggregator::list_tools(&ctx, &subject).await;
    let count = result.tools.len();
    Json(json!({ "tools": result.tools, "count": count })).into_response()
}

/// `POST /tools/{name}/invoke`: legacy invocation of one virtual tool
pub async fn legacy_invoke_tool(
    State(ctx): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(arguments): Json<Value>,
) -> Response {
    let subject = match require_subject(&ctx, &headers).await {
        Ok(subject) => subject,
        Err(response) => return response,
    };

    match crate::aggregator::call_tool(&ctx, &subject, &name, arguments).await {
        Ok(result) => Json(serde_json::to_value(result).unwrap_or(Value::Null)).into_response(),
        Err(failure) => {
            use crate::error::RpcFailure;
            let api = match failure {
                RpcFailure::Forbidden(reason) => ApiError::Forbidden(reason),
                RpcFailure::InvalidParams(detail) => ApiError::BadRequest(detail),
                RpcFailure::MethodNotFound(method) => ApiError::NotFound(method),
                RpcFailure::Internal(message) => ApiError::Internal(message),
            };
            api.into_response()
        }
    }
}
