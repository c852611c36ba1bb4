//! Account rows backing the instance registry

use super::{format_timestamp, parse_timestamp, Database};
use crate::models::{Account, InstanceStatus};
use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let status: String = row.get("status");
    let pid: Option<i64> = row.get("pid");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Account {
        account: row.get("account"),
        nickname: row.get("nickname"),
        status: InstanceStatus::from_str(&status)
            .ok_or_else(|| anyhow!("Unknown account status in database: {}", status))?,
        pid: pid.and_then(|p| u32::try_from(p).ok()),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

impl Database {
    pub async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "INSERT INTO accounts (account, nickname, status, pid, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.account)
        .bind(&account.nickname)
        .bind(account.status.as_str())
        .bind(account.pid.map(i64::from))
        .bind(format_timestamp(&account.created_at))
        .bind(format_timestamp(&account.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_account(&self, account: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT account, nickname, status, pid, created_at, updated_at
             FROM accounts WHERE account = ?",
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            "SELECT account, nickname, status, pid, created_at, updated_at
             FROM accounts ORDER BY created_at, account",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(account_from_row).collect()
    }

    /// Persist a lifecycle change. The PID is cleared when `pid` is `None`.
    pub async fn update_account_status(
        &self,
        account: &str,
        status: InstanceStatus,
        pid: Option<u32>,
    ) -> Result<()> {
        sqlx::query("UPDATE accounts SET status = ?, pid = ?, updated_at = ? WHERE account = ?")
            .bind(status.as_str())
            .bind(pid.map(i64::from))
            .bind(format_timestamp(&Utc::now()))
            .bind(account)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns false if the account did not exist
    pub async fn delete_account(&self, account: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE account = ?")
            .bind(account)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
