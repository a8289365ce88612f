//! Advisory cache layer
//!
//! [`CacheClient`] is the seam for the external key/value cache
//! collaborator: get/set plus set-membership operations, with no ordering
//! or transactional guarantees. Everything built on top of it treats the
//! cache as a pure performance optimization — a miss, a stale answer, or
//! an outright error always falls back to the authoritative store.
//!
//! [`InMemoryCache`] is the bundled implementation, suitable for
//! single-process deployments and tests.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

mod public_keys;
mod taken_names;

pub use public_keys::PublicKeyCache;
pub use taken_names::TakenNameCache;

/// Error type for cache operations
///
/// Callers never propagate this; every cache failure is recovered locally
/// by falling back to the authoritative store.
#[derive(Debug, thiserror::Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

/// Generic key/value cache client
///
/// Mirrors the operations of a conventional remote cache: plain
/// get/set-with-TTL and unordered named sets. All operations are
/// individually atomic but advisory.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Get a value by key; `None` is a miss
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Add a member to a named set
    async fn add_to_set(&self, set: &str, member: &str) -> Result<(), CacheError>;

    /// Check whether a member is in a named set
    async fn is_member(&self, set: &str, member: &str) -> Result<bool, CacheError>;
}

#[derive(Default)]
struct InMemoryState {
    values: HashMap<String, (String, Option<Instant>)>,
    sets: HashMap<String, HashSet<String>>,
}

/// In-process [`CacheClient`] implementation
///
/// TTL-aware map plus named sets behind an async `RwLock`. Expired
/// entries are dropped lazily on read.
#[derive(Default)]
pub struct InMemoryCache {
    state: RwLock<InMemoryState>,
}

impl InMemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheClient for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let state = self.state.read().await;
            match state.values.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) => {
                    if expires_at.map_or(true, |at| Instant::now() < at) {
                        return Ok(Some(value.clone()));
                    }
                }
            }
        }

        // Entry exists but is expired; drop it.
        let mut state = self.state.write().await;
        state.values.remove(key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut state = self.state.write().await;
        state
            .values
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn add_to_set(&self, set: &str, member: &str) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        state
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn is_member(&self, set: &str, member: &str) -> Result<bool, CacheError> {
        let state = self.state.read().await;
        Ok(state
            .sets
            .get(set)
            .map(|members| members.contains(member))
            .unwrap_or(false))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_set_round_trip() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);

        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_membership() {
        let cache = InMemoryCache::new();
        assert!(!cache.is_member("names", "alice").await.unwrap());

        cache.add_to_set("names", "alice").await.unwrap();
        assert!(cache.is_member("names", "alice").await.unwrap());
        assert!(!cache.is_member("names", "bob").await.unwrap());
        assert!(!cache.is_member("other", "alice").await.unwrap());
    }
}
