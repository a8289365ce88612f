use super::*;

#[tokio::test]
async fn store_and_fetch_signing_keys() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;

    let first = db.create_signing_key("pem-one").await.unwrap();
    let second = db.create_signing_key("pem-two").await.unwrap();
    assert_ne!(first, second);

    let record = db.get_signing_key(first).await.unwrap().unwrap();
    assert_eq!(record.id, first);
    assert_eq!(record.public_key_pem, "pem-one");

    assert!(db.get_signing_key(first + 1000).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn records_accumulate_across_reopens() {
    let dir = TempDir::new().unwrap();

    let db = open_test_db(&dir).await;
    let old_key = db.create_signing_key("old-process").await.unwrap();
    db.close().await;

    // A "restarted process" stores a new key; the old record survives so
    // older tokens stay verifiable.
    let db = open_test_db(&dir).await;
    let new_key = db.create_signing_key("new-process").await.unwrap();
    assert_ne!(old_key, new_key);
    assert!(db.get_signing_key(old_key).await.unwrap().is_some());

    db.close().await;
}
