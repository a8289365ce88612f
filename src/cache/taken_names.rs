//! Cache of account names known to be taken.

use std::sync::Arc;

use super::{CacheClient, CacheError};

const TAKEN_NAME_SET: &str = "taken_account_names";

/// Set-of-taken-names cache in front of the account table
///
/// A "present" answer is trusted as a fast path for the uniqueness
/// pre-check; absence means nothing and sends the caller to the
/// database. Names are only ever added, matching the immutability of
/// account names.
#[derive(Clone)]
pub struct TakenNameCache {
    client: Arc<dyn CacheClient>,
}

impl TakenNameCache {
    /// Create a cache wrapper over a cache client
    pub fn new(client: Arc<dyn CacheClient>) -> Self {
        Self { client }
    }

    /// Record a name as taken
    pub async fn add(&self, account_name: &str) -> Result<(), CacheError> {
        self.client.add_to_set(TAKEN_NAME_SET, account_name).await
    }

    /// Check whether a name is known to be taken
    pub async fn has(&self, account_name: &str) -> Result<bool, CacheError> {
        self.client.is_member(TAKEN_NAME_SET, account_name).await
    }
}
