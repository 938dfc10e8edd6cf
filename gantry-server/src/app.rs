//! Router assembly and the serve loop

use crate::state::AppState;
use crate::{discovery, rest, rpc};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the full gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        // MCP protocol surface
        .route("/mcp", get(rpc::mcp_get_handler).post(rpc::mcp_post_handler))
        // OAuth discovery and proxying
        .route(
            "/.well-known/oauth-protected-resource",
            get(discovery::protected_resource),
        )
        .route(
            "/.well-known/oauth-protected-resource/mcp",
            get(discovery::protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(discovery::authorization_server),
        )
        .route(
            "/.well-known/openid-configuration",
            get(discovery::openid_configuration),
        )
        .route("/authorize", get(discovery::authorize_proxy))
        .route("/token", post(discovery::token_proxy))
        .route("/mcp/authorize", get(discovery::authorize_proxy))
        .route("/mcp/token", post(discovery::token_proxy))
        // REST and admin surface
        .route("/mcp/servers", get(rest::list_servers))
        .route("/mcp/server/{name}/info", get(rest::server_info))
        .route("/mcp/list-tools", get(rest::list_tools))
        .route("/mcp/invoke", post(rest::invoke_tool))
        .route("/mcp/invoke-broadcast", post(rest::invoke_broadcast))
        .route("/tools", get(rest::legacy_list_tools))
        .route("/tools/{name}/invoke", post(rest::legacy_invoke_tool))
        // Liveness
        .route("/health", get(rest::health))
        .route("/config", get(rest::config_view))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until shutdown
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let address = format!(
        "{}:{}",
        state.config.gateway.host, state.config.gateway.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "gantry gateway listening");

    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
