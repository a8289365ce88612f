//! Signing-key records: the persisted public halves of token key pairs.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, SigningKey};

impl Database {
    /// Store a PEM-encoded public key and return its key ID
    ///
    /// Called once at process startup with the public half of the freshly
    /// generated key pair. Old records are kept so tokens issued before a
    /// restart remain verifiable.
    pub async fn create_signing_key(&self, public_key_pem: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO token_public_keys (public_key_pem, created_at) VALUES (?, ?)",
        )
        .bind(public_key_pem)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert signing key: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Get a signing-key record by key ID
    pub async fn get_signing_key(&self, id: i64) -> Result<Option<SigningKey>> {
        let row = sqlx::query_as::<_, SigningKey>(
            "SELECT id, public_key_pem, created_at FROM token_public_keys WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get signing key: {}",
                e
            )))
        })?;

        Ok(row)
    }
}
