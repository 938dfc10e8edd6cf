//! Bearer-token verification configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// OAuth2 / OpenID Connect settings for the token verifier
///
/// The gateway trusts an external issuer (Keycloak in the reference
/// deployment). Tokens may carry the issuer's internal Docker hostname or the
/// externally visible one; both are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Whether bearer authentication is enforced
    pub enabled: bool,

    /// Issuer base URL, e.g. `http://keycloak:8080`
    pub keycloak_url: Option<String>,

    /// Issuer realm
    pub keycloak_realm: String,

    /// Explicit JWKS URL; derived from the issuer when unset
    pub jwks_url: Option<String>,

    /// Signature algorithm the issuer uses
    pub jwt_algorithm: String,

    /// Extra accepted audience (client name), besides the resource URL
    pub jwt_audience: Option<String>,

    /// Verified-token cache TTL in seconds
    pub token_cache_ttl: u64,

    /// This gateway's resource URL, e.g. `http://localhost:8000/mcp`
    pub resource_server_url: String,

    /// Space-delimited scopes every token must carry
    pub required_scopes: String,

    /// Client id for RFC 7662 introspection (confidential clients)
    pub introspection_client_id: Option<String>,

    /// Client secret for introspection
    pub introspection_client_secret: Option<String>,

    /// Externally visible issuer host substituted for the internal one
    pub external_issuer_base: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keycloak_url: None,
            keycloak_realm: "mcp-gateway".to_string(),
            jwks_url: None,
            jwt_algorithm: "RS256".to_string(),
            jwt_audience: None,
            token_cache_ttl: 300,
            resource_server_url: "http://localhost:8000/mcp".to_string(),
            required_scopes: "mcp:tools".to_string(),
            introspection_client_id: None,
            introspection_client_secret: None,
            external_issuer_base: Some("http://localhost:8080".to_string()),
        }
    }
}

impl AuthConfig {
    /// Issuer URL as configured (may be the Docker-internal hostname)
    pub fn issuer(&self) -> String {
        let base = self.keycloak_url.as_deref().unwrap_or("http://localhost:8080");
        format!("{}/realms/{}", base.trim_end_matches('/'), self.keycloak_realm)
    }

    /// Issuer URL reachable from outside the deployment network
    pub fn external_issuer(&self) -> String {
        match &self.external_issuer_base {
            Some(base) => format!("{}/realms/{}", base.trim_end_matches('/'), self.keycloak_realm),
            None => self.issuer(),
        }
    }

    /// Every issuer form a token may legitimately carry
    pub fn accepted_issuers(&self) -> Vec<String> {
        let mut issuers = vec![self.issuer(), self.external_issuer()];
        issuers.dedup();
        issuers
    }

    /// JWKS endpoint, explicit or derived from the issuer
    pub fn jwks_endpoint(&self) -> String {
        self.jwks_url
            .clone()
            .unwrap_or_else(|| format!("{}/protocol/openid-connect/certs", self.issuer()))
    }

    /// Introspection endpoint on the issuer
    pub fn introspection_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token/introspect", self.issuer())
    }

    /// Authorization endpoint on the external issuer
    pub fn authorization_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/auth", self.external_issuer())
    }

    /// Token endpoint on the external issuer
    pub fn token_endpoint(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.external_issuer())
    }

    /// Required scopes as a list
    pub fn required_scope_list(&self) -> Vec<String> {
        self.required_scopes
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Audiences a token may name: the resource URL and the optional client id
    pub fn accepted_audiences(&self) -> Vec<String> {
        let mut audiences = vec![self.resource_server_url.clone()];
        if let Some(aud) = &self.jwt_audience {
            audiences.push(aud.clone());
        }
        audiences
    }
}

impl Validatable for AuthConfig {
    fn validate(&self) -> ConfigResult<()> {
        crate::validation::validate_enum_choice(
            &self.jwt_algorithm,
            &["RS256", "RS384", "RS512"],
            "jwt_algorithm",
            self.domain_name(),
        )?;

        if self.enabled {
            crate::validation::validate_http_url(
                &self.resource_server_url,
                "resource_server_url",
                self.domain_name(),
            )?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "auth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_derivation() {
        let config = AuthConfig {
            keycloak_url: Some("http://keycloak:8080".to_string()),
            ..AuthConfig::default()
        };

        assert_eq!(config.issuer(), "http://keycloak:8080/realms/mcp-gateway");
        assert_eq!(config.external_issuer(), "http://localhost:8080/realms/mcp-gateway");
        assert_eq!(
            config.jwks_endpoint(),
            "http://keycloak:8080/realms/mcp-gateway/protocol/openid-connect/certs"
        );

        let issuers = config.accepted_issuers();
        assert!(issuers.contains(&"http://keycloak:8080/realms/mcp-gateway".to_string()));
        assert!(issuers.contains(&"http://localhost:8080/realms/mcp-gateway".to_string()));
    }

    #[test]
    fn scope_and_audience_lists() {
        let config = AuthConfig {
            required_scopes: "mcp:tools mcp:resources".to_string(),
            jwt_audience: Some("mcp-gateway-client".to_string()),
            ..AuthConfig::default()
        };

        assert_eq!(config.required_scope_list(), vec!["mcp:tools", "mcp:resources"]);
        assert_eq!(
            config.accepted_audiences(),
            vec!["http://localhost:8000/mcp", "mcp-gateway-client"]
        );
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let config = AuthConfig {
            jwt_algorithm: "HS256".to_string(),
            ..AuthConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
