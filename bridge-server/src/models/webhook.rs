use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CommandAction, OrderType};

/// Raw TradingView-style payload. Numeric fields are kept as JSON values so
/// validation can report exactly what was wrong with them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookRequest {
    #[serde(default, alias = "account", deserialize_with = "super::opt_string_or_number")]
    pub account_number: Option<String>,
    #[serde(default)]
    pub accounts: Option<Vec<Value>>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub volume: Option<Value>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default, alias = "tp")]
    pub take_profit: Option<Value>,
    #[serde(default, alias = "sl")]
    pub stop_loss: Option<Value>,
    #[serde(default)]
    pub ticket: Option<Value>,
    #[serde(default)]
    pub position_type: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Actions accepted on the webhook route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookAction {
    Buy,
    Sell,
    Long,
    Short,
    Close,
    CloseAll,
    CloseSymbol,
}

impl WebhookAction {
    pub const ALL: [WebhookAction; 7] = [
        WebhookAction::Buy,
        WebhookAction::Sell,
        WebhookAction::Long,
        WebhookAction::Short,
        WebhookAction::Close,
        WebhookAction::CloseAll,
        WebhookAction::CloseSymbol,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(WebhookAction::Buy),
            "SELL" => Some(WebhookAction::Sell),
            "LONG" => Some(WebhookAction::Long),
            "SHORT" => Some(WebhookAction::Short),
            "CLOSE" => Some(WebhookAction::Close),
            "CLOSE_ALL" => Some(WebhookAction::CloseAll),
            "CLOSE_SYMBOL" => Some(WebhookAction::CloseSymbol),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookAction::Buy => "BUY",
            WebhookAction::Sell => "SELL",
            WebhookAction::Long => "LONG",
            WebhookAction::Short => "SHORT",
            WebhookAction::Close => "CLOSE",
            WebhookAction::CloseAll => "CLOSE_ALL",
            WebhookAction::CloseSymbol => "CLOSE_SYMBOL",
        }
    }

    /// Opening actions need a symbol and a volume
    pub fn opens_position(&self) -> bool {
        matches!(
            self,
            WebhookAction::Buy | WebhookAction::Sell | WebhookAction::Long | WebhookAction::Short
        )
    }

    /// LONG and SHORT are aliases of BUY and SELL on the EA side
    pub fn command_action(&self) -> CommandAction {
        match self {
            WebhookAction::Buy | WebhookAction::Long => CommandAction::Buy,
            WebhookAction::Sell | WebhookAction::Short => CommandAction::Sell,
            WebhookAction::Close => CommandAction::Close,
            WebhookAction::CloseAll => CommandAction::CloseAll,
            WebhookAction::CloseSymbol => CommandAction::CloseSymbol,
        }
    }
}

/// Allowlist entry controlling which accounts the webhook may trade on.
/// An empty allowlist lets every registered account through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAccount {
    #[serde(deserialize_with = "super::string_or_number")]
    pub account: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A webhook payload that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOrder {
    pub accounts: Vec<String>,
    pub action: WebhookAction,
    pub symbol: Option<String>,
    pub volume: Option<f64>,
    pub order_type: OrderType,
    pub price: Option<f64>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub ticket: Option<i64>,
    pub position_type: Option<String>,
    pub comment: Option<String>,
}

/// Delivery result for one destination account
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryResult {
    pub account: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Summary returned by the webhook and copy-trade endpoints
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchSummary {
    pub success: bool,
    pub message: String,
    pub results: Vec<DeliveryResult>,
}

impl DispatchSummary {
    /// "X sent to n/m accounts", "partial success" or a failure message
    pub fn from_results(label: &str, noun: &str, results: Vec<DeliveryResult>) -> Self {
        let total = results.len();
        let delivered = results.iter().filter(|r| r.success).count();
        let message = if total > 0 && delivered == total {
            format!("{} sent to {}/{} {}", label, delivered, total, noun)
        } else if delivered > 0 {
            format!(
                "{} partial success: sent to {}/{} {}",
                label, delivered, total, noun
            )
        } else {
            format!("{} failed for all {} {}", label, total, noun)
        };

        Self {
            success: delivered > 0,
            message,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing_is_case_insensitive() {
        assert_eq!(WebhookAction::parse("buy"), Some(WebhookAction::Buy));
        assert_eq!(WebhookAction::parse("Close_All"), Some(WebhookAction::CloseAll));
        assert_eq!(WebhookAction::parse("HOLD"), None);
    }

    #[test]
    fn test_long_short_map_to_buy_sell() {
        assert_eq!(WebhookAction::Long.command_action(), CommandAction::Buy);
        assert_eq!(WebhookAction::Short.command_action(), CommandAction::Sell);
        assert!(WebhookAction::Short.opens_position());
        assert!(!WebhookAction::CloseSymbol.opens_position());
    }

    #[test]
    fn test_request_accepts_account_alias_and_numbers() {
        let req: WebhookRequest = serde_json::from_str(
            r#"{"account": 1001, "action": "BUY", "symbol": "XAUUSD", "volume": "0.1", "tp": 2400}"#,
        )
        .unwrap();
        assert_eq!(req.account_number.as_deref(), Some("1001"));
        assert_eq!(req.volume, Some(Value::String("0.1".to_string())));
        assert!(req.take_profit.is_some());
    }

    #[test]
    fn test_summary_messages() {
        let ok = |account: &str| DeliveryResult {
            account: account.to_string(),
            success: true,
            message: "sent".to_string(),
            symbol: None,
        };
        let failed = |account: &str| DeliveryResult {
            account: account.to_string(),
            success: false,
            message: "offline".to_string(),
            symbol: None,
        };

        let all = DispatchSummary::from_results("BUY", "accounts", vec![ok("1"), ok("2")]);
        assert!(all.success);
        assert_eq!(all.message, "BUY sent to 2/2 accounts");

        let partial = DispatchSummary::from_results("BUY", "accounts", vec![ok("1"), failed("2")]);
        assert!(partial.success);
        assert!(partial.message.contains("partial success"));

        let none = DispatchSummary::from_results("BUY", "accounts", vec![failed("1")]);
        assert!(!none.success);
    }
}
