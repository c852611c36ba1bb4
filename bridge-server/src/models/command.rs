use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action understood by the EA polling the drop folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAction {
    Buy,
    Sell,
    Close,
    CloseAll,
    CloseSymbol,
    Modify,
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::Buy => "BUY",
            CommandAction::Sell => "SELL",
            CommandAction::Close => "CLOSE",
            CommandAction::CloseAll => "CLOSE_ALL",
            CommandAction::CloseSymbol => "CLOSE_SYMBOL",
            CommandAction::Modify => "MODIFY",
        }
    }
}

impl std::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    Stop,
}

impl OrderType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Some(OrderType::Market),
            "limit" => Some(OrderType::Limit),
            "stop" => Some(OrderType::Stop),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, OrderType::Market)
    }
}

/// Which producer a command file comes from; selects the file name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Webhook,
    CopyTrade,
}

impl CommandKind {
    pub fn file_prefix(&self) -> &'static str {
        match self {
            CommandKind::Webhook => "webhook_command",
            CommandKind::CopyTrade => "slave_command",
        }
    }
}

/// JSON document written for the EA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCommand {
    pub timestamp: DateTime<Utc>,
    pub action: CommandAction,
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_from: Option<String>,
}

impl TradeCommand {
    pub fn new(action: CommandAction, account: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            account: account.into(),
            command_type: None,
            symbol: None,
            order_type: None,
            volume: None,
            price: None,
            take_profit: None,
            stop_loss: None,
            ticket: None,
            position_type: None,
            comment: None,
            copy_from: None,
        }
    }
}
