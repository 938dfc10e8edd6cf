//! OAuth2 challenge response for unauthenticated requests
//!
//! A 401 carries two discovery vehicles at once: an `oauth2_metadata` block
//! in the body and a `WWW-Authenticate` header whose `resource_metadata`
//! parameter points at the RFC 8707 well-known document. MCP clients use
//! either to bootstrap the authorization-code flow.

use gantry_config::AuthConfig;
use serde_json::{json, Value};

/// Prepared 401 challenge: body plus header value
#[derive(Debug, Clone)]
pub struct OauthChallenge {
    pub body: Value,
    pub www_authenticate: String,
}

/// Well-known URL serving the protected-resource document
pub fn resource_metadata_url(config: &AuthConfig) -> String {
    let base = config
        .resource_server_url
        .trim_end_matches("/mcp")
        .trim_end_matches('/');
    format!("{}/.well-known/oauth-protected-resource", base)
}

/// Build the challenge for a failed or absent bearer token
pub fn build_challenge(config: &AuthConfig, error: &str, error_description: &str) -> OauthChallenge {
    let body = json!({
        "error": error,
        "error_description": error_description,
        "oauth2_metadata": {
            "resource": config.resource_server_url,
            "authorization_servers": [config.external_issuer()],
            "bearer_methods_supported": ["header"],
            "resource_signing_alg_values_supported": [config.jwt_algorithm],
            "scopes_supported": config.required_scope_list(),
            "resource_capabilities": ["mcp-protocol"],
        }
    });

    let www_authenticate = format!(
        "Bearer realm=\"mcp\", resource_metadata=\"{}\", error=\"{}\", error_description=\"{}\"",
        resource_metadata_url(config),
        error,
        error_description
    );

    OauthChallenge {
        body,
        www_authenticate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            keycloak_url: Some("http://keycloak:8080".to_string()),
            resource_server_url: "http://localhost:8000/mcp".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn metadata_url_strips_resource_path() {
        assert_eq!(
            resource_metadata_url(&config()),
            "http://localhost:8000/.well-known/oauth-protected-resource"
        );
    }

    #[test]
    fn challenge_names_the_well_known_document() {
        let challenge = build_challenge(&config(), "invalid_token", "Bearer token required");

        assert!(challenge
            .www_authenticate
            .contains("resource_metadata=\"http://localhost:8000/.well-known/oauth-protected-resource\""));
        assert!(challenge.www_authenticate.starts_with("Bearer realm=\"mcp\""));
        assert!(challenge.www_authenticate.contains("error=\"invalid_token\""));

        let metadata = &challenge.body["oauth2_metadata"];
        assert_eq!(metadata["resource"], "http://localhost:8000/mcp");
        assert_eq!(
            metadata["authorization_servers"][0],
            "http://localhost:8080/realms/mcp-gateway"
        );
        assert_eq!(metadata["bearer_methods_supported"][0], "header");
    }
}
