//! Terminal instance registry
//!
//! Tracks one portable MT5 terminal per account and drives its lifecycle
//! (`Created -> Starting -> Online <-> Offline`). Every state change for an
//! account happens under that account's lock, which is also taken by command
//! writers and by the liveness monitor, so a delete never races a probe.

use crate::adapters::outbound::is_valid_account_id;
use crate::config::Mt5Config;
use crate::db::Database;
use crate::history::HistoryLog;
use crate::models::{Account, AccountStats, InstanceStatus};
use crate::ports::{LaunchSpec, ProcessControl};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub mod monitor;

pub use monitor::LivenessMonitor;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid account id: {0}")]
    InvalidAccount(String),
    #[error("Account {0} already exists")]
    AlreadyExists(String),
    #[error("Account {0} not found")]
    NotFound(String),
    #[error("Failed to start terminal for account {account}: {source}")]
    Spawn {
        account: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to stop terminal for account {account}: {source}")]
    Terminate {
        account: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OpenOutcome {
    Started { pid: u32 },
    AlreadyOnline { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// A status change observed by a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub account: String,
    pub from: InstanceStatus,
    pub to: InstanceStatus,
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub main_path: PathBuf,
    pub instances_dir: PathBuf,
    pub profile_source: Option<PathBuf>,
    pub delete_instance_files: bool,
    pub stop_grace: Duration,
    pub restart_delay: Duration,
}

impl SupervisorSettings {
    pub fn from_config(config: &Mt5Config) -> Self {
        Self {
            main_path: PathBuf::from(&config.main_path),
            instances_dir: config.instances_path(),
            profile_source: Some(config.profile_source.trim())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            delete_instance_files: config.delete_instance_files,
            stop_grace: Duration::from_secs(config.stop_grace_secs),
            restart_delay: Duration::from_secs(config.restart_delay_secs),
        }
    }
}

pub struct InstanceSupervisor {
    db: Arc<Database>,
    process: Arc<dyn ProcessControl>,
    settings: SupervisorSettings,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    histories: Vec<Arc<HistoryLog>>,
}

impl InstanceSupervisor {
    pub fn new(
        db: Arc<Database>,
        process: Arc<dyn ProcessControl>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            db,
            process,
            settings,
            locks: Mutex::new(HashMap::new()),
            histories: Vec::new(),
        }
    }

    /// History logs purged when an account is deleted
    pub fn with_histories(mut self, histories: Vec<Arc<HistoryLog>>) -> Self {
        self.histories = histories;
        self
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    pub fn instance_path(&self, account: &str) -> PathBuf {
        self.settings.instances_dir.join(account)
    }

    #[cfg(test)]
    pub(crate) async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn lock_account(&self, account: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only the map references have no holder or waiter left
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(account.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn list(&self) -> anyhow::Result<Vec<Account>> {
        self.db.list_accounts().await
    }

    pub async fn get(&self, account: &str) -> anyhow::Result<Option<Account>> {
        self.db.get_account(account).await
    }

    pub async fn stats(&self) -> anyhow::Result<AccountStats> {
        let accounts = self.db.list_accounts().await?;
        Ok(AccountStats::from_accounts(&accounts))
    }

    /// Provision the instance folder, register the account and start it.
    ///
    /// A failed start is logged and leaves the account in `Created`.
    pub async fn add_account(
        &self,
        account: &str,
        nickname: &str,
    ) -> Result<Account, LifecycleError> {
        if !is_valid_account_id(account) {
            return Err(LifecycleError::InvalidAccount(account.to_string()));
        }

        let _guard = self.lock_account(account).await;
        if self.db.get_account(account).await?.is_some() {
            return Err(LifecycleError::AlreadyExists(account.to_string()));
        }

        let instance = self.instance_path(account);
        let profile_source = self.settings.profile_source.clone();
        let target = instance.clone();
        tokio::task::spawn_blocking(move || provision_instance(&target, profile_source.as_deref()))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(|e| {
                anyhow::Error::from(e)
                    .context(format!("Failed to provision instance folder {}", instance.display()))
            })?;

        self.db.insert_account(&Account::new(account, nickname)).await?;
        tracing::info!(account = %account, path = %instance.display(), "Account added");

        if let Err(e) = self.open_locked(account).await {
            tracing::warn!(account = %account, error = %e, "Account added but terminal did not start");
        }

        self.db
            .get_account(account)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(account.to_string()))
    }

    pub async fn open(&self, account: &str) -> Result<OpenOutcome, LifecycleError> {
        let _guard = self.lock_account(account).await;
        self.open_locked(account).await
    }

    pub async fn stop(&self, account: &str) -> Result<StopOutcome, LifecycleError> {
        let _guard = self.lock_account(account).await;
        self.stop_locked(account).await
    }

    /// Stop, wait `restart_delay`, open
    pub async fn restart(&self, account: &str) -> Result<OpenOutcome, LifecycleError> {
        let _guard = self.lock_account(account).await;
        let stopped = self.stop_locked(account).await?;
        if stopped == StopOutcome::Stopped {
            tokio::time::sleep(self.settings.restart_delay).await;
        }
        self.open_locked(account).await
    }

    /// Stop if running, then forget the account, its history and (if
    /// configured) its instance folder. A second delete reports `NotFound`.
    pub async fn delete(&self, account: &str) -> Result<(), LifecycleError> {
        let guard = self.lock_account(account).await;

        let existing = self
            .db
            .get_account(account)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(account.to_string()))?;

        if existing.status.is_running() || existing.pid.is_some() {
            self.stop_locked(account).await?;
        }

        if !self.db.delete_account(account).await? {
            return Err(LifecycleError::NotFound(account.to_string()));
        }

        for history in &self.histories {
            if let Err(e) = history.remove_account(account).await {
                tracing::warn!(account = %account, error = %e, "Failed to purge history for deleted account");
            }
        }

        if self.settings.delete_instance_files {
            let instance = self.instance_path(account);
            if instance.exists() {
                if let Err(e) = tokio::fs::remove_dir_all(&instance).await {
                    tracing::warn!(account = %account, error = %e, "Failed to remove instance folder");
                }
            }
        }

        drop(guard);
        tracing::info!(account = %account, "Account deleted");
        Ok(())
    }

    /// Probe one account and persist any status change
    pub async fn refresh(&self, account: &str) -> anyhow::Result<Option<Account>> {
        let _guard = self.lock_account(account).await;
        Ok(self.refresh_locked(account).await?.map(|(account, _)| account))
    }

    /// Probe every account; returns the transitions that happened
    pub async fn probe_all(&self) -> anyhow::Result<Vec<Transition>> {
        let mut transitions = Vec::new();
        for account in self.db.list_accounts().await? {
            let _guard = self.lock_account(&account.account).await;
            match self.refresh_locked(&account.account).await {
                Ok(Some((_, Some(transition)))) => transitions.push(transition),
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(account = %account.account, error = %e, "Liveness probe failed")
                }
            }
        }
        Ok(transitions)
    }

    async fn refresh_locked(
        &self,
        account: &str,
    ) -> anyhow::Result<Option<(Account, Option<Transition>)>> {
        let Some(mut current) = self.db.get_account(account).await? else {
            return Ok(None);
        };

        let alive = match current.pid {
            Some(pid) => self.process.is_alive(pid).await,
            None => false,
        };

        let next = match (current.status, alive) {
            (InstanceStatus::Starting | InstanceStatus::Offline, true) => InstanceStatus::Online,
            (InstanceStatus::Starting | InstanceStatus::Online, false) => InstanceStatus::Offline,
            (status, _) => status,
        };

        if next == current.status {
            return Ok(Some((current, None)));
        }

        let pid = if alive { current.pid } else { None };
        self.db.update_account_status(account, next, pid).await?;
        tracing::info!(
            account = %account,
            from = %current.status,
            to = %next,
            "Instance status changed"
        );

        let transition = Transition {
            account: account.to_string(),
            from: current.status,
            to: next,
        };
        current.status = next;
        current.pid = pid;
        Ok(Some((current, Some(transition))))
    }

    async fn open_locked(&self, account: &str) -> Result<OpenOutcome, LifecycleError> {
        let existing = self
            .db
            .get_account(account)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(account.to_string()))?;

        if let Some(pid) = existing.pid {
            if self.process.is_alive(pid).await {
                if existing.status != InstanceStatus::Online {
                    self.db
                        .update_account_status(account, InstanceStatus::Online, Some(pid))
                        .await?;
                }
                tracing::info!(account = %account, pid, "Terminal already online");
                return Ok(OpenOutcome::AlreadyOnline { pid });
            }
        }

        // A running status with a dead process means it crashed
        if existing.status.is_running() {
            self.db
                .update_account_status(account, InstanceStatus::Offline, None)
                .await?;
        }

        let spec = LaunchSpec::portable_terminal(&self.settings.main_path, &self.instance_path(account));
        let pid = self
            .process
            .spawn(&spec)
            .await
            .map_err(|source| LifecycleError::Spawn {
                account: account.to_string(),
                source,
            })?;

        self.db
            .update_account_status(account, InstanceStatus::Starting, Some(pid))
            .await?;
        tracing::info!(account = %account, pid, "Terminal starting");
        Ok(OpenOutcome::Started { pid })
    }

    async fn stop_locked(&self, account: &str) -> Result<StopOutcome, LifecycleError> {
        let existing = self
            .db
            .get_account(account)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(account.to_string()))?;

        if !existing.status.is_running() && existing.pid.is_none() {
            tracing::debug!(account = %account, status = %existing.status, "Stop ignored, terminal not running");
            return Ok(StopOutcome::NotRunning);
        }

        if let Some(pid) = existing.pid {
            if self.process.is_alive(pid).await {
                self.process
                    .terminate(pid, self.settings.stop_grace)
                    .await
                    .map_err(|source| LifecycleError::Terminate {
                        account: account.to_string(),
                        source,
                    })?;
            }
        }

        self.db
            .update_account_status(account, InstanceStatus::Offline, None)
            .await?;
        tracing::info!(account = %account, "Terminal stopped");
        Ok(StopOutcome::Stopped)
    }
}

/// Create `<instance>` from the profile template and make sure the folders
/// the terminal and the EA expect are present.
fn provision_instance(instance: &Path, profile_source: Option<&Path>) -> std::io::Result<()> {
    std::fs::create_dir_all(instance)?;

    match profile_source {
        Some(source) if source.is_dir() => copy_dir(source, instance)?,
        Some(source) => {
            tracing::warn!(path = %source.display(), "Profile source folder not found, starting from an empty instance")
        }
        None => {}
    }

    for sub in [
        Path::new("profiles").join("Default"),
        PathBuf::from("config"),
        Path::new("MQL5").join("Files"),
    ] {
        std::fs::create_dir_all(instance.join(sub))?;
    }
    Ok(())
}

fn copy_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
