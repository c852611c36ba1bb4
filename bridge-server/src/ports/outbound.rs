use crate::models::{Account, CommandKind, CopyPair, TradeCommand, WebhookAccount};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// How to start one terminal process
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl LaunchSpec {
    /// `<terminal> /portable /datapath:<instance> /profile:Default`
    pub fn portable_terminal(program: &Path, instance_dir: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: vec![
                "/portable".to_string(),
                format!("/datapath:{}", instance_dir.display()),
                "/profile:Default".to_string(),
            ],
            working_dir: instance_dir.to_path_buf(),
        }
    }
}

/// Spawning, probing and killing terminal processes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Start the process and return its PID
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32>;
    /// True if `pid` is alive and is a terminal process
    async fn is_alive(&self, pid: u32) -> bool;
    /// Ask the process to exit, then kill it after `grace`
    async fn terminate(&self, pid: u32, grace: Duration) -> Result<()>;
}

/// Delivery of one command document to an account's EA
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Returns where the command was written
    async fn deliver(
        &self,
        account: &str,
        kind: CommandKind,
        command: &TradeCommand,
    ) -> Result<PathBuf>;
}

/// Last balance reported by an account's terminal
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance(&self, account: &str) -> Option<f64>;
}

/// Symbols visible in an account's Market Watch
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolSource: Send + Sync {
    /// Empty when the list is unknown
    async fn available_symbols(&self, account: &str) -> Vec<String>;
}

/// Registered accounts as seen by the trading services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Re-probe the account's process and return its current state
    async fn refresh_account(&self, account: &str) -> Result<Option<Account>>;
    /// Serializes command writes and lifecycle changes for one account
    async fn lock_account(&self, account: &str) -> OwnedMutexGuard<()>;
}

/// Persisted routing data read on every signal
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoutingRepository: Send + Sync {
    async fn copy_pairs_by_api_key(&self, api_key: &str) -> Result<Vec<CopyPair>>;
    async fn list_webhook_accounts(&self) -> Result<Vec<WebhookAccount>>;
}
