//! Database layer for download-jobs
//!
//! Handles SQLite persistence for accounts, credentials, signing keys,
//! and download tasks.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`accounts`] — Account and credential rows, registration transaction
//! - [`signing_keys`] — Public halves of token signing keys
//! - [`tasks`] — Task CRUD, the claim protocol, and locked mutations
//!
//! ## Exclusive transactions
//!
//! Operations that must serialize against concurrent claimers (task
//! claims, ownership-checked updates and deletes, the registration
//! recheck) run inside `BEGIN IMMEDIATE` transactions. SQLite's immediate
//! transaction takes the write lock up front, and the configured busy
//! timeout makes contenders block on it rather than fail, so re-checking
//! state after the lock is acquired is race-free.

use crate::error::DatabaseError;
use crate::types::{AccountId, TaskId};
use crate::{Error, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqlitePool;
use sqlx::{FromRow, Sqlite};

mod accounts;
mod migrations;
mod signing_keys;
mod tasks;

/// Account record from database
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    /// Unique database ID
    pub id: AccountId,
    /// Unique display name, immutable once set
    pub account_name: String,
    /// Unix timestamp when the account was created
    pub created_at: i64,
}

/// Credential record from database (one-to-one with an account)
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    /// Owning account ID
    pub of_account_id: AccountId,
    /// Opaque password hash (argon2id PHC string)
    pub password_hash: String,
    /// Unix timestamp of the last password change
    pub updated_at: i64,
}

/// Signing-key record from database
///
/// Only the public half of a key pair is ever stored; the private half
/// lives in process memory for the process's lifetime. Records accumulate
/// across restarts so tokens issued before a restart stay verifiable.
#[derive(Debug, Clone, FromRow)]
pub struct SigningKey {
    /// Key ID referenced by token `kid` headers
    pub id: i64,
    /// PEM-encoded (SPKI) public key
    pub public_key_pem: String,
    /// Unix timestamp when the key was stored
    pub created_at: i64,
}

/// New download task to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewDownloadTask {
    /// Owning account ID
    pub of_account_id: AccountId,
    /// Download type code (see [`crate::types::DownloadType`])
    pub download_type: i32,
    /// Source URL
    pub url: String,
    /// Free-form metadata as a JSON object string
    pub metadata: String,
}

/// Download task record from database
#[derive(Debug, Clone, FromRow)]
pub struct DownloadTaskRow {
    /// Unique database ID
    pub id: TaskId,
    /// Owning account ID, immutable
    pub of_account_id: AccountId,
    /// Download type code (see [`crate::types::DownloadType`])
    pub download_type: i32,
    /// Source URL
    pub url: String,
    /// Status code (see [`crate::types::TaskStatus`])
    pub download_status: i32,
    /// Free-form metadata as a JSON object string
    pub metadata: String,
    /// Unix timestamp when the task was created
    pub created_at: i64,
    /// Unix timestamp of the last status or URL write
    pub updated_at: i64,
}

/// Database handle for download-jobs
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open an exclusive (`BEGIN IMMEDIATE`) transaction on a dedicated
    /// connection
    ///
    /// The caller must finish the transaction with [`commit_tx`] or
    /// [`rollback_tx`] before the connection is returned to the pool.
    pub(crate) async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to begin immediate transaction: {}",
                    e
                )))
            })?;

        Ok(conn)
    }
}

/// Commit an exclusive transaction opened by [`Database::begin_immediate`]
pub(crate) async fn commit_tx(conn: &mut PoolConnection<Sqlite>) -> Result<()> {
    sqlx::query("COMMIT")
        .execute(&mut **conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit transaction: {}",
                e
            )))
        })?;
    Ok(())
}

/// Roll back an exclusive transaction opened by
/// [`Database::begin_immediate`]
///
/// Best-effort: a rollback failure is logged, not propagated, since the
/// caller is already unwinding with a more interesting error.
pub(crate) async fn rollback_tx(conn: &mut PoolConnection<Sqlite>) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut **conn).await {
        tracing::warn!(error = %e, "failed to roll back transaction");
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
