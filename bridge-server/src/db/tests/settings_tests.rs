//! Tests for custom symbol mappings and the webhook allowlist

use super::*;
use crate::models::WebhookAccount;

#[tokio::test]
async fn test_symbol_mapping_upsert_normalizes_case() {
    let db = create_test_db().await;

    db.upsert_symbol_mapping("Gold.x", "xauusd").await.unwrap();
    db.upsert_symbol_mapping("GOLD.X", "XAUUSD.a").await.unwrap();

    let mappings = db.list_symbol_mappings().await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings.get("gold.x").map(String::as_str), Some("XAUUSD.A"));

    assert!(db.delete_symbol_mapping("gold.X").await.unwrap());
    assert!(!db.delete_symbol_mapping("gold.x").await.unwrap());
}

#[tokio::test]
async fn test_webhook_allowlist_crud() {
    let db = create_test_db().await;

    db.upsert_webhook_account(&WebhookAccount {
        account: "1001".to_string(),
        nickname: "Main".to_string(),
        enabled: true,
    })
    .await
    .unwrap();
    db.upsert_webhook_account(&WebhookAccount {
        account: "1001".to_string(),
        nickname: "Main".to_string(),
        enabled: false,
    })
    .await
    .unwrap();

    let entries = db.list_webhook_accounts().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].enabled);

    assert!(db.delete_webhook_account("1001").await.unwrap());
    assert!(db.list_webhook_accounts().await.unwrap().is_empty());
}
