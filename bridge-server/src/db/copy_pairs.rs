//! Copy pair CRUD operations

use super::{format_timestamp, parse_timestamp, Database};
use crate::models::{CopyPair, CopySettings, PairStatus};
use anyhow::{anyhow, Result};
use sqlx::{sqlite::SqliteRow, Row};

const PAIR_COLUMNS: &str = "id, master_account, slave_account, master_nickname, slave_nickname,
     api_key, settings, status, created_at, updated_at";

fn pair_from_row(row: &SqliteRow) -> Result<CopyPair> {
    let settings_json: String = row.get("settings");
    let settings: CopySettings = serde_json::from_str(&settings_json)?;
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(CopyPair {
        id: row.get("id"),
        master_account: row.get("master_account"),
        slave_account: row.get("slave_account"),
        master_nickname: row.get("master_nickname"),
        slave_nickname: row.get("slave_nickname"),
        api_key: row.get("api_key"),
        settings,
        status: PairStatus::from_str(&status)
            .ok_or_else(|| anyhow!("Unknown pair status in database: {}", status))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

impl Database {
    pub async fn insert_copy_pair(&self, pair: &CopyPair) -> Result<()> {
        let settings_json = serde_json::to_string(&pair.settings)?;

        sqlx::query(
            "INSERT INTO copy_pairs (id, master_account, slave_account, master_nickname,
                 slave_nickname, api_key, settings, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&pair.id)
        .bind(&pair.master_account)
        .bind(&pair.slave_account)
        .bind(&pair.master_nickname)
        .bind(&pair.slave_nickname)
        .bind(&pair.api_key)
        .bind(&settings_json)
        .bind(pair.status.as_str())
        .bind(format_timestamp(&pair.created_at))
        .bind(format_timestamp(&pair.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_copy_pair(&self, id: &str) -> Result<Option<CopyPair>> {
        let row = sqlx::query(&format!("SELECT {} FROM copy_pairs WHERE id = ?", PAIR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(pair_from_row).transpose()
    }

    pub async fn list_copy_pairs(&self) -> Result<Vec<CopyPair>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM copy_pairs ORDER BY created_at, id",
            PAIR_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pair_from_row).collect()
    }

    /// All pairs sharing `api_key`, active or not
    pub async fn copy_pairs_by_api_key(&self, api_key: &str) -> Result<Vec<CopyPair>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM copy_pairs WHERE api_key = ? ORDER BY created_at, id",
            PAIR_COLUMNS
        ))
        .bind(api_key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pair_from_row).collect()
    }

    pub async fn find_copy_pair(&self, master: &str, slave: &str) -> Result<Option<CopyPair>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM copy_pairs WHERE master_account = ? AND slave_account = ?",
            PAIR_COLUMNS
        ))
        .bind(master)
        .bind(slave)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(pair_from_row).transpose()
    }

    /// Overwrite settings, status and updated_at of an existing pair
    pub async fn update_copy_pair(&self, pair: &CopyPair) -> Result<()> {
        let settings_json = serde_json::to_string(&pair.settings)?;

        sqlx::query("UPDATE copy_pairs SET settings = ?, status = ?, updated_at = ? WHERE id = ?")
            .bind(&settings_json)
            .bind(pair.status.as_str())
            .bind(format_timestamp(&pair.updated_at))
            .bind(&pair.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_copy_pair(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM copy_pairs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
