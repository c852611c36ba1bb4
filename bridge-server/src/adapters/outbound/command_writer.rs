//! Drop-folder command writer
//!
//! Each command becomes one JSON file in `<instances_dir>/<account>/MQL5/Files`,
//! which the EA polls, executes and deletes. Files are written under a
//! temporary name and renamed into place so the EA never reads a partial
//! document.

use super::instance_dir;
use crate::models::{CommandKind, TradeCommand};
use crate::ports::CommandSink;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Drop folder relative to the instance folder
pub const DROP_FOLDER: [&str; 2] = ["MQL5", "Files"];

#[derive(Debug, Error)]
pub enum CommandSinkError {
    #[error("Invalid account id: {0}")]
    InvalidAccount(String),
    #[error("Instance folder does not exist: {0}")]
    InstanceMissing(PathBuf),
    #[error("Refusing to write into protected folder {0}")]
    ForbiddenPath(PathBuf),
    #[error("Failed to serialize command: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FileCommandSink {
    instances_dir: PathBuf,
    /// Instance-relative folders the EA owns exclusively
    forbidden: Vec<PathBuf>,
    seq: AtomicU64,
}

impl FileCommandSink {
    pub fn new(instances_dir: impl Into<PathBuf>, forbidden_subdirs: &[String]) -> Self {
        Self {
            instances_dir: instances_dir.into(),
            forbidden: forbidden_subdirs.iter().map(PathBuf::from).collect(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn drop_folder(&self, account: &str) -> Result<PathBuf, CommandSinkError> {
        let instance = instance_dir(&self.instances_dir, account)
            .ok_or_else(|| CommandSinkError::InvalidAccount(account.to_string()))?;
        let target = DROP_FOLDER.iter().fold(instance.clone(), |p, c| p.join(c));
        self.ensure_allowed(&instance, &target)?;
        Ok(target)
    }

    fn ensure_allowed(&self, instance: &Path, target: &Path) -> Result<(), CommandSinkError> {
        let relative = target
            .strip_prefix(instance)
            .map_err(|_| CommandSinkError::ForbiddenPath(target.to_path_buf()))?;
        let relative = lowercase(relative);

        for forbidden in &self.forbidden {
            if relative.starts_with(lowercase(forbidden)) {
                return Err(CommandSinkError::ForbiddenPath(target.to_path_buf()));
            }
        }
        Ok(())
    }

    fn next_file_name(&self, kind: CommandKind) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}_{}_{}.json",
            kind.file_prefix(),
            Utc::now().timestamp_millis(),
            seq
        )
    }

    async fn write(
        &self,
        account: &str,
        kind: CommandKind,
        command: &TradeCommand,
    ) -> Result<PathBuf, CommandSinkError> {
        let instance = instance_dir(&self.instances_dir, account)
            .ok_or_else(|| CommandSinkError::InvalidAccount(account.to_string()))?;
        if !tokio::fs::try_exists(&instance).await.unwrap_or(false) {
            return Err(CommandSinkError::InstanceMissing(instance));
        }

        let folder = self.drop_folder(account)?;
        tokio::fs::create_dir_all(&folder).await?;

        let body = serde_json::to_vec_pretty(command)?;
        let name = self.next_file_name(kind);
        let final_path = folder.join(&name);
        let tmp_path = folder.join(format!(".{}.tmp", name));

        tokio::fs::write(&tmp_path, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(final_path)
    }
}

/// Folder comparison ignores case, as the terminals run on Windows
fn lowercase(path: &Path) -> PathBuf {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect()
}

#[async_trait]
impl CommandSink for FileCommandSink {
    async fn deliver(
        &self,
        account: &str,
        kind: CommandKind,
        command: &TradeCommand,
    ) -> anyhow::Result<PathBuf> {
        let path = self.write(account, kind, command).await?;
        tracing::info!(
            account = %account,
            action = %command.action,
            file = %path.display(),
            "Command file written"
        );
        Ok(path)
    }
}
