//! Verified-token cache
//!
//! Entries are keyed by a SHA-256 of the token string so raw tokens never sit
//! in memory longer than the request. An entry's TTL is the minimum of the
//! configured cache TTL and the token's own remaining lifetime, so the cache
//! can never outlive the token.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry {
    claims: Value,
    expires_at: Instant,
}

/// TTL map of verified claim sets
pub struct TokenCache {
    ttl: Duration,
    entries: RwLock<HashMap<[u8; 32], Entry>>,
}

impl TokenCache {
    /// Create a cache with the given default TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(token: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().into()
    }

    /// Look up a token; expired entries are dropped on access
    pub fn get(&self, token: &str) -> Option<Value> {
        let key = Self::key(token);

        {
            let guard = self.entries.read().expect("token cache poisoned");
            match guard.get(&key) {
                Some(entry) if entry.expires_at > Instant::now() => return Some(entry.claims.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but expired; take the write lock to evict it.
        let mut guard = self.entries.write().expect("token cache poisoned");
        if let Some(entry) = guard.get(&key) {
            if entry.expires_at <= Instant::now() {
                guard.remove(&key);
            } else {
                return Some(entry.claims.clone());
            }
        }
        None
    }

    /// Insert a verified claim set; `token_remaining` caps the entry TTL
    pub fn insert(&self, token: &str, claims: Value, token_remaining: Option<Duration>) {
        let ttl = match token_remaining {
            Some(remaining) => self.ttl.min(remaining),
            None => self.ttl,
        };
        if ttl.is_zero() {
            return;
        }

        let mut guard = self.entries.write().expect("token cache poisoned");
        guard.insert(
            Self::key(token),
            Entry {
                claims,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Number of live entries (test hook)
    pub fn len(&self) -> usize {
        self.entries.read().expect("token cache poisoned").len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hit_and_miss() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.insert("tok-1", json!({"sub": "a"}), None);

        assert_eq!(cache.get("tok-1"), Some(json!({"sub": "a"})));
        assert_eq!(cache.get("tok-2"), None);
    }

    #[test]
    fn expired_entry_never_returned() {
        let cache = TokenCache::new(Duration::from_secs(60));
        // Token expires sooner than the cache TTL: the entry TTL is clamped.
        cache.insert("tok", json!({"sub": "a"}), Some(Duration::ZERO));
        assert_eq!(cache.get("tok"), None);
    }

    #[test]
    fn token_lifetime_caps_ttl() {
        let cache = TokenCache::new(Duration::from_secs(3600));
        cache.insert("tok", json!({"sub": "a"}), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("tok"), None);
        assert!(cache.is_empty());
    }
}
