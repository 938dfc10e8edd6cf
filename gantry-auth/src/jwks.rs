//! JWKS fetching and caching
//!
//! The issuer's key set is fetched lazily and cached for an hour. The cache
//! is a single read-mostly value; refresh replaces it wholesale.

use crate::error::{AuthError, AuthResult};
use serde::Deserialize;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long a fetched key set stays valid
const JWKS_TTL: Duration = Duration::from_secs(3600);

/// One JSON Web Key, RSA fields only
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
}

/// The issuer's published key set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a key by its `kid`
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

struct CachedSet {
    set: JwkSet,
    fetched_at: Instant,
}

/// Lazily populated JWKS cache
pub struct JwksCache {
    url: String,
    client: reqwest::Client,
    state: RwLock<Option<CachedSet>>,
}

impl JwksCache {
    /// Create a cache over the given JWKS endpoint
    pub fn new(url: String, client: reqwest::Client) -> Self {
        Self {
            url,
            client,
            state: RwLock::new(None),
        }
    }

    /// Return the cached key set, fetching when absent or stale
    pub async fn get(&self) -> AuthResult<JwkSet> {
        {
            let guard = self.state.read().expect("jwks lock poisoned");
            if let Some(cached) = guard.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_TTL {
                    return Ok(cached.set.clone());
                }
            }
        }

        let set = self.fetch().await?;
        let mut guard = self.state.write().expect("jwks lock poisoned");
        *guard = Some(CachedSet {
            set: set.clone(),
            fetched_at: Instant::now(),
        });
        Ok(set)
    }

    async fn fetch(&self) -> AuthResult<JwkSet> {
        debug!(url = %self.url, "fetching JWKS");
        let response = self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AuthError::JwksFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::JwksFetch(e.to_string()))
    }
}
