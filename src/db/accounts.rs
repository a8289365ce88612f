//! Account and credential operations, including the registration
//! transaction.

use crate::error::DatabaseError;
use crate::types::AccountId;
use crate::{Error, Result};
use sqlx::Sqlite;
use sqlx::pool::PoolConnection;

use super::{Account, Credential, Database, commit_tx, rollback_tx};

impl Database {
    /// Create an account and its credential row atomically
    ///
    /// Runs inside an exclusive transaction and re-checks name uniqueness
    /// immediately before the insert; this in-transaction check, together
    /// with the `UNIQUE` constraint on `account_name`, is what actually
    /// prevents two concurrent registrations from both succeeding. Any
    /// cache-level pre-check is purely an optimization.
    ///
    /// Returns [`Error::Conflict`] if the name is taken; no partial
    /// account or credential row survives a failed registration.
    pub async fn create_account(
        &self,
        account_name: &str,
        password_hash: &str,
    ) -> Result<AccountId> {
        let mut conn = self.begin_immediate().await?;

        let result = Self::create_account_in_tx(&mut conn, account_name, password_hash).await;

        match result {
            Ok(id) => {
                commit_tx(&mut conn).await?;
                Ok(id)
            }
            Err(e) => {
                rollback_tx(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn create_account_in_tx(
        conn: &mut PoolConnection<Sqlite>,
        account_name: &str,
        password_hash: &str,
    ) -> Result<AccountId> {
        // Authoritative re-check under the write lock; closes the race
        // between any pre-check and the insert.
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM accounts WHERE account_name = ?")
                .bind(account_name)
                .fetch_optional(&mut **conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check account name: {}",
                        e
                    )))
                })?;

        if existing.is_some() {
            return Err(Error::Conflict(format!(
                "account name \"{}\" is already taken",
                account_name
            )));
        }

        let now = chrono::Utc::now().timestamp();

        let insert = sqlx::query(
            "INSERT INTO accounts (account_name, created_at) VALUES (?, ?)",
        )
        .bind(account_name)
        .bind(now)
        .execute(&mut **conn)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => Error::Conflict(format!(
                "account name \"{}\" is already taken",
                account_name
            )),
            _ => Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert account: {}",
                e
            ))),
        })?;

        let account_id = AccountId(insert.last_insert_rowid());

        sqlx::query(
            "INSERT INTO account_credentials (of_account_id, password_hash, updated_at) \
             VALUES (?, ?, ?)",
        )
        .bind(account_id)
        .bind(password_hash)
        .bind(now)
        .execute(&mut **conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert credential: {}",
                e
            )))
        })?;

        Ok(account_id)
    }

    /// Get an account by display name
    pub async fn get_account_by_name(&self, account_name: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            "SELECT id, account_name, created_at FROM accounts WHERE account_name = ?",
        )
        .bind(account_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get account by name: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get an account by ID
    pub async fn get_account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            "SELECT id, account_name, created_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get account by id: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get the credential row for an account
    pub async fn get_credential(&self, account_id: AccountId) -> Result<Option<Credential>> {
        let row = sqlx::query_as::<_, Credential>(
            "SELECT of_account_id, password_hash, updated_at \
             FROM account_credentials WHERE of_account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get credential: {}",
                e
            )))
        })?;

        Ok(row)
    }
}
