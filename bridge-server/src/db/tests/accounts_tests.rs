use super::*;
use crate::models::{Account, InstanceStatus};

#[tokio::test]
async fn test_insert_and_get_account() {
    let db = create_test_db().await;

    db.insert_account(&Account::new("1001", "Main")).await.unwrap();

    let account = db.get_account("1001").await.unwrap().unwrap();
    assert_eq!(account.nickname, "Main");
    assert_eq!(account.status, InstanceStatus::Created);
    assert_eq!(account.pid, None);
}

#[tokio::test]
async fn test_duplicate_account_is_rejected() {
    let db = create_test_db().await;

    db.insert_account(&Account::new("1001", "Main")).await.unwrap();
    assert!(db.insert_account(&Account::new("1001", "Again")).await.is_err());
}

#[tokio::test]
async fn test_update_status_sets_and_clears_pid() {
    let db = create_test_db().await;
    db.insert_account(&Account::new("1001", "")).await.unwrap();

    db.update_account_status("1001", InstanceStatus::Starting, Some(4242))
        .await
        .unwrap();
    let account = db.get_account("1001").await.unwrap().unwrap();
    assert_eq!(account.status, InstanceStatus::Starting);
    assert_eq!(account.pid, Some(4242));

    db.update_account_status("1001", InstanceStatus::Offline, None)
        .await
        .unwrap();
    let account = db.get_account("1001").await.unwrap().unwrap();
    assert_eq!(account.status, InstanceStatus::Offline);
    assert_eq!(account.pid, None);
}

#[tokio::test]
async fn test_delete_account_twice() {
    let db = create_test_db().await;
    db.insert_account(&Account::new("1001", "")).await.unwrap();

    assert!(db.delete_account("1001").await.unwrap());
    assert!(!db.delete_account("1001").await.unwrap());
    assert!(db.list_accounts().await.unwrap().is_empty());
}
