//! Account registration and session creation
//!
//! [`AccountService`] owns the registration uniqueness guard: a
//! taken-name cache answers the common "is this popular name taken"
//! question without a database round trip, while the actual duplicate
//! prevention happens inside the registration transaction (re-check under
//! the write lock plus the unique constraint). The cache is never the
//! sole guard.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::{Authenticator, hash_password, verify_password};
use crate::cache::TakenNameCache;
use crate::db::Database;
use crate::types::AccountId;
use crate::{Error, Result};

/// Registers accounts and authenticates credentials into bearer tokens
pub struct AccountService {
    db: Arc<Database>,
    taken_names: TakenNameCache,
    authenticator: Arc<Authenticator>,
}

impl AccountService {
    /// Create the service over its collaborators
    pub fn new(
        db: Arc<Database>,
        taken_names: TakenNameCache,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self {
            db,
            taken_names,
            authenticator,
        }
    }

    /// Pre-check whether an account name is taken
    ///
    /// A cache hit of "present" short-circuits; anything else (absent,
    /// cache error) falls back to the account table, backfilling the
    /// cache best-effort on a hit. Only used as a fast path — the
    /// registration transaction re-verifies authoritatively.
    async fn is_name_taken(&self, account_name: &str) -> Result<bool> {
        match self.taken_names.has(account_name).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    account_name,
                    error = %e,
                    "taken-name cache read failed, falling back to database"
                );
            }
        }

        if self.db.get_account_by_name(account_name).await?.is_none() {
            return Ok(false);
        }

        if let Err(e) = self.taken_names.add(account_name).await {
            tracing::warn!(
                account_name,
                error = %e,
                "failed to backfill taken-name cache"
            );
        }

        Ok(true)
    }

    /// Register a new account
    ///
    /// Fails with [`Error::Conflict`] if the name is taken. Of any number
    /// of concurrent registrations for the same name, at most one
    /// succeeds; the rest observe the conflict and leave no partial rows.
    pub async fn register(&self, account_name: &str, password: &str) -> Result<AccountId> {
        if self.is_name_taken(account_name).await? {
            return Err(Error::Conflict(format!(
                "account name \"{}\" is already taken",
                account_name
            )));
        }

        let password_hash = hash_password(password)?;
        let account_id = self.db.create_account(account_name, &password_hash).await?;

        tracing::info!(account_name, %account_id, "registered account");
        Ok(account_id)
    }

    /// Exchange credentials for a bearer token
    ///
    /// Unknown names and wrong passwords both fail with the same
    /// [`Error::Unauthenticated`]; the caller cannot probe which.
    pub async fn authenticate(
        &self,
        account_name: &str,
        password: &str,
    ) -> Result<(String, DateTime<Utc>)> {
        let account = self
            .db
            .get_account_by_name(account_name)
            .await?
            .ok_or_else(|| Error::Unauthenticated("incorrect account name or password".to_string()))?;

        let credential = self.db.get_credential(account.id).await?.ok_or_else(|| {
            // Creation is atomic, so a missing credential row is
            // corruption, not caller error.
            Error::Internal(format!("account {} has no credential row", account.id))
        })?;

        if !verify_password(password, &credential.password_hash)? {
            return Err(Error::Unauthenticated(
                "incorrect account name or password".to_string(),
            ));
        }

        self.authenticator.issue(account.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::{CacheClient, InMemoryCache, PublicKeyCache};
    use crate::config::{AuthConfig, DatabaseConfig};
    use tempfile::TempDir;

    async fn test_service(dir: &TempDir) -> (AccountService, Arc<dyn CacheClient>) {
        let db_config = DatabaseConfig {
            path: dir.path().join("accounts.db"),
            ..Default::default()
        };
        let db = Arc::new(Database::new(&db_config).await.unwrap());
        let cache: Arc<dyn CacheClient> = Arc::new(InMemoryCache::new());
        let authenticator = Arc::new(
            Authenticator::new(
                db.clone(),
                PublicKeyCache::new(cache.clone()),
                &AuthConfig::default(),
            )
            .await
            .unwrap(),
        );
        let service = AccountService::new(
            db,
            TakenNameCache::new(cache.clone()),
            authenticator,
        );
        (service, cache)
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let dir = TempDir::new().unwrap();
        let (service, _cache) = test_service(&dir).await;

        let id = service.register("alice", "hunter2").await.unwrap();
        assert!(id.get() > 0);

        let (token, expiry) = service.authenticate("alice", "hunter2").await.unwrap();
        assert!(!token.is_empty());
        assert!(expiry > Utc::now());
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let (service, _cache) = test_service(&dir).await;

        service.register("alice", "first").await.unwrap();
        let err = service.register("alice", "second").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // The original credentials still work; the loser left no trace.
        service.authenticate("alice", "first").await.unwrap();
        assert!(matches!(
            service.authenticate("alice", "second").await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_registrations_admit_exactly_one() {
        let dir = TempDir::new().unwrap();
        let db_config = DatabaseConfig {
            path: dir.path().join("accounts.db"),
            ..Default::default()
        };
        let db = Arc::new(Database::new(&db_config).await.unwrap());
        let cache: Arc<dyn CacheClient> = Arc::new(InMemoryCache::new());
        let authenticator = Arc::new(
            Authenticator::new(
                db.clone(),
                PublicKeyCache::new(cache.clone()),
                &AuthConfig::default(),
            )
            .await
            .unwrap(),
        );
        let service = Arc::new(AccountService::new(
            db.clone(),
            TakenNameCache::new(cache),
            authenticator,
        ));

        let mut handles = Vec::new();
        for i in 0..4 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.register("bob", &format!("pw{}", i)).await
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 3);

        // Exactly one row for the contested name.
        assert!(db.get_account_by_name("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cache_presence_short_circuits_registration() {
        let dir = TempDir::new().unwrap();
        let (service, cache) = test_service(&dir).await;

        // A "present" cache answer is trusted without consulting the
        // store, even when the store disagrees.
        cache
            .add_to_set("taken_account_names", "carol")
            .await
            .unwrap();
        assert!(matches!(
            service.register("carol", "pw").await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn lookup_backfills_the_cache() {
        let dir = TempDir::new().unwrap();
        let (service, cache) = test_service(&dir).await;

        service.register("dave", "pw").await.unwrap();
        // First duplicate attempt goes to the database and backfills.
        let _ = service.register("dave", "pw").await;
        assert!(cache
            .is_member("taken_account_names", "dave")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_name_and_wrong_password_look_identical() {
        let dir = TempDir::new().unwrap();
        let (service, _cache) = test_service(&dir).await;

        service.register("erin", "right").await.unwrap();

        let unknown = service.authenticate("nobody", "x").await.unwrap_err();
        let wrong = service.authenticate("erin", "wrong").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }
}
