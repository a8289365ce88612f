//! Cache of token-verification public keys, keyed by key ID.

use std::sync::Arc;
use std::time::Duration;

use super::{CacheClient, CacheError};

// Key records never change once written, but a TTL keeps the cache from
// accumulating keys of long-dead processes indefinitely.
const PUBLIC_KEY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn cache_key(key_id: i64) -> String {
    format!("token_public_key:{}", key_id)
}

/// PEM-keyed public-key cache in front of the signing-key table
#[derive(Clone)]
pub struct PublicKeyCache {
    client: Arc<dyn CacheClient>,
}

impl PublicKeyCache {
    /// Create a cache wrapper over a cache client
    pub fn new(client: Arc<dyn CacheClient>) -> Self {
        Self { client }
    }

    /// Get a cached PEM by key ID
    pub async fn get(&self, key_id: i64) -> Result<Option<String>, CacheError> {
        self.client.get(&cache_key(key_id)).await
    }

    /// Backfill a PEM for a key ID
    pub async fn set(&self, key_id: i64, public_key_pem: &str) -> Result<(), CacheError> {
        self.client
            .set(&cache_key(key_id), public_key_pem, Some(PUBLIC_KEY_TTL))
            .await
    }
}
