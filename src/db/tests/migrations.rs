use super::*;

#[tokio::test]
async fn migrations_create_a_usable_schema() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;

    // All four tables exist and accept writes.
    let account_id = seed_account(&db, "alice").await;
    assert!(account_id.get() > 0);

    let key_id = db.create_signing_key("-----BEGIN PUBLIC KEY-----").await.unwrap();
    assert!(key_id > 0);

    db.close().await;
}

#[tokio::test]
async fn reopening_an_existing_database_is_idempotent() {
    let dir = TempDir::new().unwrap();

    let db = open_test_db(&dir).await;
    let account_id = seed_account(&db, "alice").await;
    db.close().await;

    // Second open must not re-run v1 against the existing schema.
    let db = open_test_db(&dir).await;
    let account = db.get_account_by_id(account_id).await.unwrap().unwrap();
    assert_eq!(account.account_name, "alice");
    db.close().await;
}
