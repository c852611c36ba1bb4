//! Test utilities module
//!
//! Shared helpers for database tests

use crate::db::Database;
use crate::models::{CopyPair, CopySettings, PairStatus};
use chrono::Utc;

pub(crate) async fn create_test_db() -> Database {
    Database::new("sqlite::memory:").await.unwrap()
}

pub(crate) fn create_test_pair(id: &str, master: &str, slave: &str, api_key: &str) -> CopyPair {
    CopyPair {
        id: id.to_string(),
        master_account: master.to_string(),
        slave_account: slave.to_string(),
        master_nickname: "Master".to_string(),
        slave_nickname: "Slave".to_string(),
        api_key: api_key.to_string(),
        settings: CopySettings::default(),
        status: PairStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// Test submodules
mod accounts_tests;
mod settings_tests;
