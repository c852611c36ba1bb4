use super::Database;
use crate::models::WebhookAccount;
use anyhow::Result;
use sqlx::Row;

impl Database {
    pub async fn list_webhook_accounts(&self) -> Result<Vec<WebhookAccount>> {
        let rows = sqlx::query("SELECT account, nickname, enabled FROM webhook_accounts ORDER BY account")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let enabled: i64 = row.get("enabled");
                WebhookAccount {
                    account: row.get("account"),
                    nickname: row.get("nickname"),
                    enabled: enabled != 0,
                }
            })
            .collect())
    }

    pub async fn upsert_webhook_account(&self, entry: &WebhookAccount) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_accounts (account, nickname, enabled) VALUES (?, ?, ?)
             ON CONFLICT(account) DO UPDATE SET nickname = excluded.nickname,
                 enabled = excluded.enabled",
        )
        .bind(&entry.account)
        .bind(&entry.nickname)
        .bind(entry.enabled as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_webhook_account(&self, account: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhook_accounts WHERE account = ?")
            .bind(account)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
