//! Bearer token subsystem
//!
//! [`Authenticator`] owns an Ed25519 key pair generated once at process
//! start. The private half never leaves memory; the public half is
//! PEM-encoded and persisted as a signing-key record whose row ID becomes
//! the `kid` carried in every issued token. Verification resolves the
//! `kid` back to a public key through a cache-then-store lookup, so
//! tokens issued by earlier processes (whose key records are still in the
//! store) remain verifiable without any server-side session table.
//!
//! Every verification failure — bad signature, expired, missing claims,
//! unknown `kid`, wrong algorithm — surfaces as the same
//! [`Error::Unauthenticated`]; callers never learn which check failed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::cache::PublicKeyCache;
use crate::config::AuthConfig;
use crate::db::Database;
use crate::types::AccountId;
use crate::{Error, Result};

mod password;

pub use password::{hash_password, verify_password};

/// Claim set carried by issued tokens
///
/// The key ID travels in the JWT header (`kid`), which is readable before
/// signature verification — exactly the order the verifier needs it in.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Account ID the token was issued for
    sub: i64,
    /// Expiry as a unix timestamp
    exp: i64,
}

/// Issues and verifies bearer tokens
///
/// Constructed once at startup; a failure to generate or persist the key
/// pair is fatal, since the process must not accept traffic without a
/// usable signing key.
pub struct Authenticator {
    db: Arc<Database>,
    key_cache: PublicKeyCache,
    encoding_key: EncodingKey,
    key_id: i64,
    token_ttl_secs: u64,
}

impl Authenticator {
    /// Generate a fresh key pair, persist its public half, and return a
    /// ready authenticator
    pub async fn new(
        db: Arc<Database>,
        key_cache: PublicKeyCache,
        config: &AuthConfig,
    ) -> Result<Self> {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);

        let pkcs8_der = signing_key.to_pkcs8_der().map_err(|e| {
            Error::Internal(format!("failed to encode signing key: {}", e))
        })?;
        let encoding_key = EncodingKey::from_ed_der(pkcs8_der.as_bytes());

        let public_key_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| {
                Error::Internal(format!("failed to PEM-encode public key: {}", e))
            })?;

        let key_id = db.create_signing_key(&public_key_pem).await?;
        tracing::info!(key_id, "generated token signing key pair");

        Ok(Self {
            db,
            key_cache,
            encoding_key,
            key_id,
            token_ttl_secs: config.token_ttl_secs,
        })
    }

    /// Issue a signed token for an account
    ///
    /// Returns the token string and its expiry time.
    pub fn issue(&self, account_id: AccountId) -> Result<(String, DateTime<Utc>)> {
        let expiry = Utc::now() + chrono::Duration::seconds(self.token_ttl_secs as i64);
        let claims = Claims {
            sub: account_id.get(),
            exp: expiry.timestamp(),
        };

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.key_id.to_string());

        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(error = %e, "failed to sign token");
                Error::Internal("failed to sign token".to_string())
            })?;

        Ok((token, expiry))
    }

    /// Verify a token and return the account it was issued for plus its
    /// expiry
    ///
    /// Fails with [`Error::Unauthenticated`] for any defect: wrong
    /// algorithm, missing or non-numeric `kid`, unknown key record, bad
    /// signature, missing claims, or expiry in the past.
    pub async fn verify(&self, token: &str) -> Result<(AccountId, DateTime<Utc>)> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|_| Error::Unauthenticated("malformed token".to_string()))?;

        if header.alg != Algorithm::EdDSA {
            return Err(Error::Unauthenticated(
                "unexpected signing algorithm".to_string(),
            ));
        }

        let key_id: i64 = header
            .kid
            .as_deref()
            .and_then(|kid| kid.parse().ok())
            .ok_or_else(|| Error::Unauthenticated("token has no usable kid".to_string()))?;

        let decoding_key = self.resolve_public_key(key_id).await?;

        let mut validation = Validation::new(Algorithm::EdDSA);
        // `sub` is issued as a number, which jsonwebtoken's spec-claim
        // validator cannot parse (it only accepts strings); its presence
        // is enforced by `Claims` deserialization instead.
        validation.set_required_spec_claims(&["exp"]);

        let data = jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token validation failed");
                Error::Unauthenticated("invalid token".to_string())
            })?;

        let expiry = DateTime::from_timestamp(data.claims.exp, 0)
            .ok_or_else(|| Error::Unauthenticated("invalid token".to_string()))?;

        Ok((AccountId(data.claims.sub), expiry))
    }

    /// Resolve a `kid` to a verification key, cache first, store second
    ///
    /// Cache failures fall through to the store and the fetched PEM is
    /// backfilled best-effort. An absent key record means the token
    /// references a key this deployment has never stored, which is a
    /// caller problem (unauthenticated), not an internal one.
    async fn resolve_public_key(&self, key_id: i64) -> Result<DecodingKey> {
        match self.key_cache.get(key_id).await {
            Ok(Some(pem)) => match DecodingKey::from_ed_pem(pem.as_bytes()) {
                Ok(key) => return Ok(key),
                Err(e) => {
                    tracing::warn!(
                        key_id,
                        error = %e,
                        "cached public key is unparsable, falling back to store"
                    );
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    key_id,
                    error = %e,
                    "public key cache read failed, falling back to store"
                );
            }
        }

        let record = self
            .db
            .get_signing_key(key_id)
            .await?
            .ok_or_else(|| Error::Unauthenticated("token public key not found".to_string()))?;

        if let Err(e) = self.key_cache.set(key_id, &record.public_key_pem).await {
            tracing::warn!(key_id, error = %e, "failed to backfill public key cache");
        }

        DecodingKey::from_ed_pem(record.public_key_pem.as_bytes()).map_err(|e| {
            Error::Internal(format!("stored public key {} is unparsable: {}", key_id, e))
        })
    }

    /// Key ID of this process's signing key
    pub fn key_id(&self) -> i64 {
        self.key_id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::DatabaseConfig;
    use tempfile::TempDir;

    async fn test_db(dir: &TempDir, name: &str) -> Arc<Database> {
        let config = DatabaseConfig {
            path: dir.path().join(name),
            ..Default::default()
        };
        Arc::new(Database::new(&config).await.unwrap())
    }

    fn test_key_cache() -> PublicKeyCache {
        PublicKeyCache::new(Arc::new(InMemoryCache::new()))
    }

    async fn test_authenticator(db: Arc<Database>, ttl_secs: u64) -> Authenticator {
        let config = AuthConfig {
            token_ttl_secs: ttl_secs,
        };
        Authenticator::new(db, test_key_cache(), &config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn issue_then_verify_round_trips() {
        let dir = TempDir::new().unwrap();
        let auth = test_authenticator(test_db(&dir, "auth.db").await, 3600).await;

        let (token, issued_expiry) = auth.issue(AccountId(42)).unwrap();
        let (account_id, verified_expiry) = auth.verify(&token).await.unwrap();

        assert_eq!(account_id, AccountId(42));
        assert_eq!(verified_expiry.timestamp(), issued_expiry.timestamp());
    }

    #[tokio::test]
    async fn unknown_kid_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let auth = test_authenticator(test_db(&dir, "auth.db").await, 3600).await;

        // Sign with the real key but point the header at a key record
        // that does not exist.
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some("9999".to_string());
        let claims = Claims {
            sub: 1,
            exp: Utc::now().timestamp() + 3600,
        };
        let token = jsonwebtoken::encode(&header, &claims, &auth.encoding_key).unwrap();

        assert!(matches!(
            auth.verify(&token).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn missing_kid_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let auth = test_authenticator(test_db(&dir, "auth.db").await, 3600).await;

        let header = Header::new(Algorithm::EdDSA);
        let claims = Claims {
            sub: 1,
            exp: Utc::now().timestamp() + 3600,
        };
        let token = jsonwebtoken::encode(&header, &claims, &auth.encoding_key).unwrap();

        assert!(matches!(
            auth.verify(&token).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn expired_token_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let auth = test_authenticator(test_db(&dir, "auth.db").await, 3600).await;

        // Well past any validation leeway.
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(auth.key_id.to_string());
        let claims = Claims {
            sub: 7,
            exp: Utc::now().timestamp() - 7200,
        };
        let token = jsonwebtoken::encode(&header, &claims, &auth.encoding_key).unwrap();

        assert!(matches!(
            auth.verify(&token).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn foreign_signature_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        // Two processes with distinct key pairs but colliding key IDs
        // (separate stores, both assign ID 1).
        let auth_a = test_authenticator(test_db(&dir, "a.db").await, 3600).await;
        let auth_b = test_authenticator(test_db(&dir, "b.db").await, 3600).await;

        let (token, _) = auth_a.issue(AccountId(1)).unwrap();
        assert!(matches!(
            auth_b.verify(&token).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn tampered_token_is_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let auth = test_authenticator(test_db(&dir, "auth.db").await, 3600).await;

        let (token, _) = auth.issue(AccountId(5)).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

        assert!(matches!(
            auth.verify(&tampered).await,
            Err(Error::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn verification_works_across_authenticators_sharing_a_store() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir, "shared.db").await;

        // Simulates a restart: the old process's key record is still in
        // the store, so its tokens verify under the new process.
        let old = test_authenticator(db.clone(), 3600).await;
        let new = test_authenticator(db, 3600).await;
        assert_ne!(old.key_id(), new.key_id());

        let (token, _) = old.issue(AccountId(3)).unwrap();
        let (account_id, _) = new.verify(&token).await.unwrap();
        assert_eq!(account_id, AccountId(3));
    }
}
