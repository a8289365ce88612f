use crate::config::DatabaseConfig;
use crate::types::AccountId;
use tempfile::TempDir;

use super::Database;

mod migrations;
mod signing_keys;
mod tasks;

async fn open_test_db(dir: &TempDir) -> Database {
    let config = DatabaseConfig {
        path: dir.path().join("test.db"),
        ..Default::default()
    };
    Database::new(&config).await.unwrap()
}

async fn seed_account(db: &Database, name: &str) -> AccountId {
    db.create_account(name, "$argon2id$fake-hash-for-tests")
        .await
        .unwrap()
}
