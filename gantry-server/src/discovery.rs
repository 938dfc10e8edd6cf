//! Discovery endpoints and OAuth proxying
//!
//! All unauthenticated. The well-known documents let MCP clients auto-enrol;
//! `/authorize` and `/token` exist for clients that derive OAuth endpoints
//! from the gateway base URL instead of reading the metadata.

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, error};

/// `GET /.well-known/oauth-protected-resource` (RFC 8707)
pub async fn protected_resource(State(ctx): State<AppState>) -> Json<Value> {
    Json(gantry_auth::protected_resource_metadata(&ctx.config.auth))
}

/// `GET /.well-known/oauth-authorization-server` (RFC 8414)
pub async fn authorization_server(State(ctx): State<AppState>) -> Json<Value> {
    Json(gantry_auth::authorization_server_metadata(&ctx.config.auth))
}

/// `GET /.well-known/openid-configuration`: pass the issuer's document through
pub async fn openid_configuration(State(ctx): State<AppState>) -> Response {
    let url = format!("{}/.well-known/openid-configuration", ctx.config.auth.issuer());
    debug!(url = %url, "proxying OpenID configuration");

    match reqwest::get(&url).await {
        Ok(response) => match response.json::<Value>().await {
            Ok(document) => Json(document).into_response(),
            Err(e) => discovery_proxy_error(e.to_string()),
        },
        Err(e) => discovery_proxy_error(e.to_string()),
    }
}

/// `GET /authorize`: 302 to the issuer's authorization endpoint, with every
/// query parameter preserved
pub async fn authorize_proxy(
    State(ctx): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let target = ctx.config.auth.authorization_endpoint();
    let url = if params.is_empty() {
        target
    } else {
        reqwest::Url::parse_with_params(&target, params.iter())
            .map(|u| u.to_string())
            .unwrap_or(target)
    };
    debug!(url = %url, "redirecting authorization request to the issuer");
    (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
}

/// `POST /token`: forward the token exchange form to the issuer
pub async fn token_proxy(
    State(ctx): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let url = ctx.config.auth.token_endpoint();
    debug!(url = %url, grant_type = %form.get("grant_type").cloned().unwrap_or_default(), "proxying token request");

    let client = reqwest::Client::new();
    match client.post(&url).form(&form).send().await {
        Ok(response) => {
            let status =
                StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            match response.json::<Value>().await {
                Ok(body) => (status, Json(body)).into_response(),
                Err(e) => discovery_proxy_error(e.to_string()),
            }
        }
        Err(e) => discovery_proxy_error(e.to_string()),
    }
}

fn discovery_proxy_error(detail: String) -> Response {
    error!(detail = %detail, "issuer proxy request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "server_error",
            "error_description": format!("Failed to reach the authorization server: {}", detail),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_keeps_query_parameters() {
        let mut params = HashMap::new();
        params.insert("client_id".to_string(), "vscode".to_string());
        params.insert("redirect_uri".to_string(), "http://localhost:3000/cb".to_string());

        let url = reqwest::Url::parse_with_params(
            "http://localhost:8080/realms/mcp-gateway/protocol/openid-connect/auth",
            params.iter(),
        )
        .unwrap();

        assert!(url.as_str().contains("client_id=vscode"));
        assert!(url.as_str().contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcb"));
    }
}
