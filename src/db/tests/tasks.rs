use std::sync::Arc;

use crate::db::NewDownloadTask;
use crate::types::{AccountId, TaskStatus};
use crate::Error;

use super::*;

fn new_task(account_id: AccountId, url: &str) -> NewDownloadTask {
    NewDownloadTask {
        of_account_id: account_id,
        download_type: 0,
        url: url.to_string(),
        metadata: "{}".to_string(),
    }
}

#[tokio::test]
async fn insert_and_get_task() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;
    let account_id = seed_account(&db, "alice").await;

    let id = db
        .insert_task(&new_task(account_id, "http://example.test/a.bin"))
        .await
        .unwrap();
    assert!(id.get() > 0);

    let task = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(task.of_account_id, account_id);
    assert_eq!(task.url, "http://example.test/a.bin");
    assert_eq!(task.download_status, TaskStatus::Pending.as_i32());
    assert_eq!(task.metadata, "{}");

    db.close().await;
}

#[tokio::test]
async fn list_and_count_are_scoped_to_the_account() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;
    let alice = seed_account(&db, "alice").await;
    let bob = seed_account(&db, "bob").await;

    for i in 0..3 {
        db.insert_task(&new_task(alice, &format!("http://example.test/{}.bin", i)))
            .await
            .unwrap();
    }
    db.insert_task(&new_task(bob, "http://example.test/bob.bin"))
        .await
        .unwrap();

    assert_eq!(db.count_tasks_of_account(alice).await.unwrap(), 3);
    assert_eq!(db.count_tasks_of_account(bob).await.unwrap(), 1);

    let page = db.list_tasks_of_account(alice, 1, 10).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].url, "http://example.test/1.bin");

    db.close().await;
}

#[tokio::test]
async fn claim_transitions_pending_to_downloading_once() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;
    let account_id = seed_account(&db, "alice").await;
    let id = db
        .insert_task(&new_task(account_id, "http://example.test/a.bin"))
        .await
        .unwrap();

    let claimed = db.claim_task(id).await.unwrap().unwrap();
    assert_eq!(claimed.download_status, TaskStatus::Downloading.as_i32());

    // Second claim is a silent no-op, not an error.
    assert!(db.claim_task(id).await.unwrap().is_none());

    let row = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(row.download_status, TaskStatus::Downloading.as_i32());

    db.close().await;
}

#[tokio::test]
async fn claim_of_missing_task_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;

    assert!(db.claim_task(crate::types::TaskId(404)).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn claim_of_terminal_task_does_not_regress_status() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;
    let account_id = seed_account(&db, "alice").await;
    let id = db
        .insert_task(&new_task(account_id, "http://example.test/a.bin"))
        .await
        .unwrap();

    db.claim_task(id).await.unwrap().unwrap();
    db.update_task_status(id, TaskStatus::Completed).await.unwrap();

    assert!(db.claim_task(id).await.unwrap().is_none());
    let row = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(row.download_status, TaskStatus::Completed.as_i32());

    db.close().await;
}

#[tokio::test]
async fn concurrent_claims_admit_exactly_one() {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(open_test_db(&dir).await);
    let account_id = seed_account(&db, "alice").await;
    let id = db
        .insert_task(&new_task(account_id, "http://example.test/a.bin"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move { db.claim_task(id).await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    db.close().await;
}

#[tokio::test]
async fn update_url_enforces_ownership_and_lifecycle() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;
    let alice = seed_account(&db, "alice").await;
    let bob = seed_account(&db, "bob").await;
    let id = db
        .insert_task(&new_task(alice, "http://example.test/a.bin"))
        .await
        .unwrap();

    // Foreign account may not touch the row.
    let err = db
        .update_task_url(id, bob, "http://example.test/b.bin")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));

    // Owner may, while pending.
    let updated = db
        .update_task_url(id, alice, "http://example.test/b.bin")
        .await
        .unwrap();
    assert_eq!(updated.url, "http://example.test/b.bin");

    // Once claimed, the URL is frozen.
    db.claim_task(id).await.unwrap().unwrap();
    let err = db
        .update_task_url(id, alice, "http://example.test/c.bin")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // The failed attempts left the row unchanged.
    let row = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(row.url, "http://example.test/b.bin");

    db.close().await;
}

#[tokio::test]
async fn delete_enforces_ownership_and_claim_state() {
    let dir = TempDir::new().unwrap();
    let db = open_test_db(&dir).await;
    let alice = seed_account(&db, "alice").await;
    let bob = seed_account(&db, "bob").await;
    let id = db
        .insert_task(&new_task(alice, "http://example.test/a.bin"))
        .await
        .unwrap();

    let err = db.delete_task(id, bob).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));

    db.claim_task(id).await.unwrap().unwrap();
    let err = db.delete_task(id, alice).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Terminal tasks are deletable again.
    db.update_task_status(id, TaskStatus::Failed).await.unwrap();
    db.delete_task(id, alice).await.unwrap();
    assert!(db.get_task(id).await.unwrap().is_none());

    let err = db.delete_task(id, alice).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    db.close().await;
}
