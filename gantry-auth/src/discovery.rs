//! Discovery metadata documents
//!
//! Builders for the well-known documents MCP clients use to auto-enrol:
//! the RFC 8707 protected-resource document, the RFC 8414 authorization
//! server document, and the OAuth capability hints embedded in `initialize`.

use gantry_config::AuthConfig;
use gantry_protocol::messages::OauthCapability;
use serde_json::{json, Value};

/// RFC 8707 protected-resource metadata
pub fn protected_resource_metadata(config: &AuthConfig) -> Value {
    json!({
        "resource": config.resource_server_url,
        "authorization_servers": [config.external_issuer()],
        "bearer_methods_supported": ["header"],
        "resource_signing_alg_values_supported": [config.jwt_algorithm],
        "scopes_supported": config.required_scope_list(),
        "resource_capabilities": ["mcp-protocol"],
        "mcp_version": gantry_protocol::MCP_PROTOCOL_VERSION,
        "public_clients_supported": true,
        "authorization_code_flow_supported": true,
    })
}

/// RFC 8414 authorization-server metadata, built from the external issuer
pub fn authorization_server_metadata(config: &AuthConfig) -> Value {
    let issuer = config.external_issuer();
    json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{}/protocol/openid-connect/auth", issuer),
        "token_endpoint": format!("{}/protocol/openid-connect/token", issuer),
        "token_endpoint_auth_methods_supported": [
            "client_secret_basic",
            "client_secret_post",
            "private_key_jwt",
            "none"
        ],
        "jwks_uri": format!("{}/protocol/openid-connect/certs", issuer),
        "response_types_supported": ["code", "token", "id_token"],
        "grant_types_supported": ["authorization_code", "refresh_token", "client_credentials"],
        "introspection_endpoint": format!("{}/protocol/openid-connect/token/introspect", issuer),
        "revocation_endpoint": format!("{}/protocol/openid-connect/revoke", issuer),
        "code_challenge_methods_supported": ["S256", "plain"],
        "scopes_supported": discovery_scopes(config),
    })
}

/// OAuth capability hints for `initialize` and `GET /mcp`
pub fn oauth_capability(config: &AuthConfig) -> OauthCapability {
    OauthCapability {
        authorization_url: config.authorization_endpoint(),
        token_url: config.token_endpoint(),
        client_id: "gantry-public-client".to_string(),
        scopes: discovery_scopes(config),
    }
}

fn discovery_scopes(config: &AuthConfig) -> Vec<String> {
    let mut scopes: Vec<String> = ["openid", "profile", "email"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    scopes.extend(config.required_scope_list());
    scopes
}
