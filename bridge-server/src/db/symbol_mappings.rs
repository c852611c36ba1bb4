use super::Database;
use anyhow::Result;
use sqlx::Row;
use std::collections::HashMap;

impl Database {
    /// Custom symbol mappings, keyed by lowercase input
    pub async fn list_symbol_mappings(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT input, target FROM symbol_mappings")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("input"), row.get::<String, _>("target")))
            .collect())
    }

    pub async fn upsert_symbol_mapping(&self, input: &str, target: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO symbol_mappings (input, target) VALUES (?, ?)
             ON CONFLICT(input) DO UPDATE SET target = excluded.target,
                 updated_at = CURRENT_TIMESTAMP",
        )
        .bind(input.trim().to_lowercase())
        .bind(target.trim().to_uppercase())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_symbol_mapping(&self, input: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM symbol_mappings WHERE input = ?")
            .bind(input.trim().to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
