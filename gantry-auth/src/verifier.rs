//! Bearer-token verification
//!
//! Two code paths share one cache: JWKS-verified JWTs for public clients
//! (authorization-code flow with PKCE) and RFC 7662 introspection for
//! confidential clients with opaque tokens. Signature, expiry, issuer,
//! audience, and scope checks all have to pass before a subject is derived.

use crate::cache::TokenCache;
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksCache;
use crate::subject::Subject;
use chrono::Utc;
use gantry_config::AuthConfig;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Extract the bearer token from an `Authorization` header value
pub fn extract_bearer_token(authorization: Option<&str>) -> AuthResult<&str> {
    let header = authorization.ok_or(AuthError::MissingToken)?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Verifies bearer tokens against the configured issuer
pub struct TokenVerifier {
    config: AuthConfig,
    jwks: JwksCache,
    cache: TokenCache,
    http: reqwest::Client,
}

impl TokenVerifier {
    /// Build a verifier from the auth configuration
    pub fn new(config: AuthConfig) -> Self {
        let http = reqwest::Client::new();
        let jwks = JwksCache::new(config.jwks_endpoint(), http.clone());
        let cache = TokenCache::new(Duration::from_secs(config.token_cache_ttl));
        Self {
            config,
            jwks,
            cache,
            http,
        }
    }

    /// Verify a bearer token, consulting the cache first
    pub async fn verify(&self, token: &str) -> AuthResult<Subject> {
        if let Some(claims) = self.cache.get(token) {
            debug!("token found in cache");
            return Ok(Subject::from_claims(claims));
        }

        // Opaque tokens cannot be decoded as JWTs; route them to
        // introspection when confidential-client credentials are configured.
        let claims = match decode_header(token) {
            Ok(header) => self.verify_jwt(token, header).await?,
            Err(e) if self.introspection_configured() => {
                debug!(error = %e, "token is not a JWT, falling back to introspection");
                self.introspect(token).await?
            }
            Err(e) => return Err(AuthError::InvalidToken(e.to_string())),
        };

        self.cache.insert(token, claims.clone(), remaining_lifetime(&claims));
        Ok(Subject::from_claims(claims))
    }

    fn introspection_configured(&self) -> bool {
        self.config.introspection_client_id.is_some()
            && self.config.introspection_client_secret.is_some()
    }

    /// JWKS path: signature first, then manual issuer/audience/scope checks
    async fn verify_jwt(&self, token: &str, header: jsonwebtoken::Header) -> AuthResult<Value> {
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token header has no kid".to_string()))?;

        let jwks = self.jwks.get().await?;
        let jwk = jwks.find(&kid).ok_or_else(|| {
            warn!(kid = %kid, "no JWKS key matches token kid");
            AuthError::UnknownKey(kid.clone())
        })?;

        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| AuthError::InvalidToken(format!("bad JWKS key material: {}", e)))?;

        let algorithm = Algorithm::from_str(&self.config.jwt_algorithm)
            .map_err(|_| AuthError::InvalidToken(format!("unsupported algorithm {}", self.config.jwt_algorithm)))?;

        // Issuer and audience are validated manually below: tokens may carry
        // either the internal or the external issuer hostname, and audience
        // is optional for public clients.
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;

        let data = decode::<Value>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        validate_claims(&data.claims, &self.config)?;
        Ok(data.claims)
    }

    /// RFC 7662 path: POST the token with client credentials
    pub async fn introspect(&self, token: &str) -> AuthResult<Value> {
        let (client_id, client_secret) = match (
            &self.config.introspection_client_id,
            &self.config.introspection_client_secret,
        ) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => {
                return Err(AuthError::Introspection(
                    "introspection client credentials not configured".to_string(),
                ))
            }
        };

        let response = self
            .http
            .post(self.config.introspection_endpoint())
            .basic_auth(client_id, Some(client_secret))
            .form(&[("token", token)])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AuthError::Introspection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Introspection(format!(
                "introspection endpoint returned {}",
                response.status()
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| AuthError::Introspection(e.to_string()))?;

        validate_introspection(&result, &self.config)?;
        Ok(result)
    }
}

/// Manual claim validation shared by tests and the JWT path
pub fn validate_claims(claims: &Value, config: &AuthConfig) -> AuthResult<()> {
    // Issuer must be one of the accepted internal/external forms.
    let issuer = claims.get("iss").and_then(Value::as_str).unwrap_or_default();
    if !config.accepted_issuers().iter().any(|i| i == issuer) {
        warn!(issuer, "token issuer not in the accepted set");
        return Err(AuthError::UntrustedIssuer);
    }

    // Audience, when present, must intersect the accepted set. Public
    // clients may omit it entirely.
    if let Some(aud) = claims.get("aud") {
        let token_audiences = audience_list(aud);
        if !token_audiences.is_empty() {
            let accepted = config.accepted_audiences();
            if !token_audiences.iter().any(|a| accepted.contains(a)) {
                warn!(?token_audiences, "token audience mismatch");
                return Err(AuthError::AudienceMismatch);
            }
        }
    }

    check_scopes(claims.get("scope").and_then(Value::as_str).unwrap_or(""), config)
}

/// Validation rules for an introspection response
pub fn validate_introspection(result: &Value, config: &AuthConfig) -> AuthResult<()> {
    if !result.get("active").and_then(Value::as_bool).unwrap_or(false) {
        return Err(AuthError::Inactive);
    }

    // Introspected confidential-client tokens must name this resource server.
    let audiences = result.get("aud").map(audience_list).unwrap_or_default();
    if audiences.is_empty() {
        return Err(AuthError::AudienceMismatch);
    }
    if !audiences.iter().any(|a| a == &config.resource_server_url) {
        return Err(AuthError::AudienceMismatch);
    }

    check_scopes(result.get("scope").and_then(Value::as_str).unwrap_or(""), config)
}

fn check_scopes(scope: &str, config: &AuthConfig) -> AuthResult<()> {
    let token_scopes: Vec<&str> = scope.split_whitespace().collect();
    let missing: Vec<String> = config
        .required_scope_list()
        .into_iter()
        .filter(|required| !token_scopes.contains(&required.as_str()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::MissingScopes(missing))
    }
}

fn audience_list(aud: &Value) -> Vec<String> {
    match aud {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn remaining_lifetime(claims: &Value) -> Option<Duration> {
    let exp = claims.get("exp").and_then(Value::as_i64)?;
    let remaining = exp - Utc::now().timestamp();
    Some(Duration::from_secs(remaining.max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> AuthConfig {
        AuthConfig {
            keycloak_url: Some("http://keycloak:8080".to_string()),
            jwt_audience: Some("mcp-gateway-client".to_string()),
            required_scopes: "mcp:tools".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer_token(Some("Bearer abc123")).unwrap(), "abc123");
        assert_eq!(extract_bearer_token(Some("bearer abc123")).unwrap(), "abc123");
        assert!(matches!(extract_bearer_token(None), Err(AuthError::MissingToken)));
        assert!(matches!(
            extract_bearer_token(Some("Basic dXNlcg==")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            extract_bearer_token(Some("Bearer a b")),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn accepts_internal_and_external_issuers() {
        let config = test_config();
        for issuer in [
            "http://keycloak:8080/realms/mcp-gateway",
            "http://localhost:8080/realms/mcp-gateway",
        ] {
            let claims = json!({"iss": issuer, "scope": "mcp:tools"});
            assert!(validate_claims(&claims, &config).is_ok(), "issuer {}", issuer);
        }

        let claims = json!({"iss": "http://evil:8080/realms/mcp-gateway", "scope": "mcp:tools"});
        assert!(matches!(
            validate_claims(&claims, &config),
            Err(AuthError::UntrustedIssuer)
        ));
    }

    #[test]
    fn audience_optional_but_checked_when_present() {
        let config = test_config();
        let issuer = "http://keycloak:8080/realms/mcp-gateway";

        // No audience: acceptable for public clients.
        let claims = json!({"iss": issuer, "scope": "mcp:tools"});
        assert!(validate_claims(&claims, &config).is_ok());

        // Matching audience via client name.
        let claims = json!({"iss": issuer, "aud": "mcp-gateway-client", "scope": "mcp:tools"});
        assert!(validate_claims(&claims, &config).is_ok());

        // Matching audience via resource URL inside a list.
        let claims = json!({
            "iss": issuer,
            "aud": ["http://localhost:8000/mcp", "account"],
            "scope": "mcp:tools"
        });
        assert!(validate_claims(&claims, &config).is_ok());

        // Non-matching audience.
        let claims = json!({"iss": issuer, "aud": "someone-else", "scope": "mcp:tools"});
        assert!(matches!(
            validate_claims(&claims, &config),
            Err(AuthError::AudienceMismatch)
        ));
    }

    #[test]
    fn missing_scope_is_a_403() {
        let config = test_config();
        let claims = json!({
            "iss": "http://keycloak:8080/realms/mcp-gateway",
            "scope": "openid profile"
        });
        let err = validate_claims(&claims, &config).unwrap_err();
        assert!(matches!(&err, AuthError::MissingScopes(missing) if missing == &vec!["mcp:tools".to_string()]));
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn introspection_requires_active_and_audience() {
        let config = test_config();

        let result = json!({"active": false});
        assert!(matches!(
            validate_introspection(&result, &config),
            Err(AuthError::Inactive)
        ));

        let result = json!({"active": true, "scope": "mcp:tools"});
        assert!(matches!(
            validate_introspection(&result, &config),
            Err(AuthError::AudienceMismatch)
        ));

        let result = json!({
            "active": true,
            "aud": "http://localhost:8000/mcp",
            "scope": "mcp:tools",
            "sub": "svc",
        });
        assert!(validate_introspection(&result, &config).is_ok());
    }

    #[test]
    fn remaining_lifetime_clamps_past_expiry() {
        let claims = json!({"exp": Utc::now().timestamp() - 100});
        assert_eq!(remaining_lifetime(&claims), Some(Duration::ZERO));
        assert_eq!(remaining_lifetime(&json!({})), None);
    }
}
