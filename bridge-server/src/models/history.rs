use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Error,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Success => "success",
            HistoryStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Some(HistoryStatus::Success),
            "error" => Some(HistoryStatus::Error),
            _ => None,
        }
    }
}

/// One row of the webhook trade history or the copy-trade history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: HistoryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slave: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(status: HistoryStatus, action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            status,
            account: None,
            master: None,
            slave: None,
            action: action.into(),
            symbol: None,
            volume: None,
            price: None,
            message: message.into(),
            pair_id: None,
        }
    }

    pub fn success(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(HistoryStatus::Success, action, message)
    }

    pub fn error(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(HistoryStatus::Error, action, message)
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_pair(
        mut self,
        master: impl Into<String>,
        slave: impl Into<String>,
        pair_id: Option<String>,
    ) -> Self {
        self.master = Some(master.into());
        self.slave = Some(slave.into());
        self.pair_id = pair_id;
        self
    }

    pub fn with_symbol(mut self, symbol: Option<String>) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn with_volume(mut self, volume: Option<f64>) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_price(mut self, price: Option<f64>) -> Self {
        self.price = price;
        self
    }

    /// True if the entry concerns `account` in any role
    pub fn involves(&self, account: &str) -> bool {
        [&self.account, &self.master, &self.slave]
            .iter()
            .any(|a| a.as_deref() == Some(account))
    }
}

/// Filters accepted by the history listing endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub symbol: Option<String>,
    pub account: Option<String>,
    /// Only entries at or after this instant
    pub since: Option<DateTime<Utc>>,
}

/// Aggregate counts reported by `GET /api/copy/history/stats`
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HistoryStats {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    /// Percentage of successful entries, 0 when empty
    pub success_rate: f64,
}
