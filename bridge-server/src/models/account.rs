use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an isolated terminal instance.
///
/// `Created → Starting → Online ⇄ Offline`. Deletion removes the account row,
/// so there is no stored `Deleted` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InstanceStatus {
    Created,
    Starting,
    Online,
    Offline,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Created => "Created",
            InstanceStatus::Starting => "Starting",
            InstanceStatus::Online => "Online",
            InstanceStatus::Offline => "Offline",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Created" => Some(InstanceStatus::Created),
            "Starting" => Some(InstanceStatus::Starting),
            "Online" => Some(InstanceStatus::Online),
            "Offline" => Some(InstanceStatus::Offline),
            _ => None,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, next),
            (Created, Starting)
                | (Starting, Online)
                | (Starting, Offline)
                | (Online, Offline)
                | (Offline, Starting)
                | (Offline, Online)
        )
    }

    /// A process is expected to exist in these states
    pub fn is_running(&self) -> bool {
        matches!(self, InstanceStatus::Starting | InstanceStatus::Online)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trading account backed by one isolated MT5 terminal instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub account: String,
    pub nickname: String,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(account: impl Into<String>, nickname: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            account: account.into(),
            nickname: nickname.into(),
            status: InstanceStatus::Created,
            pid: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == InstanceStatus::Online
    }
}

/// Counts reported by `GET /accounts/stats` and `GET /health`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

impl AccountStats {
    pub fn from_accounts(accounts: &[Account]) -> Self {
        let online = accounts.iter().filter(|a| a.is_online()).count();
        Self {
            total: accounts.len(),
            online,
            offline: accounts.len() - online,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(deserialize_with = "super::string_or_number")]
    pub account: String,
    #[serde(default)]
    pub nickname: String,
}
