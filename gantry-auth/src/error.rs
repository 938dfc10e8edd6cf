//! Authentication error types

use thiserror::Error;

/// Result type for token verification
pub type AuthResult<T> = Result<T, AuthError>;

/// Token verification errors
///
/// `http_status` distinguishes the two user-visible classes: 401 for tokens
/// that could not be validated at all, 403 for valid tokens lacking scopes.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Bearer token required")]
    MissingToken,

    #[error("Invalid Authorization header format. Expected: Bearer <token>")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid issuer. Token is not from a trusted authorization server.")]
    UntrustedIssuer,

    #[error("Invalid audience. Token is not intended for this resource.")]
    AudienceMismatch,

    #[error("Token missing required scopes: {0:?}")]
    MissingScopes(Vec<String>),

    #[error("Token is not active")]
    Inactive,

    #[error("No signing key found for kid '{0}'")]
    UnknownKey(String),

    #[error("Failed to fetch JWKS: {0}")]
    JwksFetch(String),

    #[error("Token introspection failed: {0}")]
    Introspection(String),
}

impl AuthError {
    /// HTTP status this error surfaces as
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::MissingScopes(_) => 403,
            AuthError::JwksFetch(_) => 500,
            _ => 401,
        }
    }
}
