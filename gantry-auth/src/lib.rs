//! OAuth2 bearer verification for the Gantry gateway
//!
//! Validates tokens two ways against an external issuer: JWKS-verified JWTs
//! for public clients and RFC 7662 introspection for confidential clients.
//! Also builds the 401 challenge and the well-known discovery documents MCP
//! clients need to auto-configure.

pub mod cache;
pub mod challenge;
pub mod discovery;
pub mod error;
pub mod jwks;
pub mod subject;
pub mod verifier;

pub use cache::TokenCache;
pub use challenge::{build_challenge, resource_metadata_url, OauthChallenge};
pub use discovery::{authorization_server_metadata, oauth_capability, protected_resource_metadata};
pub use error::{AuthError, AuthResult};
pub use jwks::{Jwk, JwkSet, JwksCache};
pub use subject::Subject;
pub use verifier::{extract_bearer_token, TokenVerifier};
