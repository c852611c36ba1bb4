use serde::Deserialize;

/// Trade event posted by the master EA to `POST /api/copy/trade`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CopySignalRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default, deserialize_with = "super::opt_string_or_number")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "super::opt_string_or_number")]
    pub account: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, rename = "type")]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub tp: Option<f64>,
    #[serde(default)]
    pub sl: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Open,
    Close,
    Modify,
}

impl SignalEvent {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deal_add" | "order_add" => Some(SignalEvent::Open),
            "deal_close" | "position_close" => Some(SignalEvent::Close),
            "position_modify" => Some(SignalEvent::Modify),
            _ => None,
        }
    }
}

/// A signal that passed request validation
#[derive(Debug, Clone, PartialEq)]
pub struct CopySignal {
    pub event: SignalEvent,
    pub order_id: Option<String>,
    pub master_account: String,
    pub symbol: String,
    /// BUY or SELL, required for open events only
    pub trade_type: Option<String>,
    pub volume: f64,
    pub tp: Option<f64>,
    pub sl: Option<f64>,
}
