use thiserror::Error;

use crate::models::{
    CommandAction, CopyPair, CopySignal, CopySignalRequest, OrderType, SignalEvent, TradeCommand,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SignalError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    #[error("Invalid trade type: {0}. Must be BUY or SELL")]
    InvalidTradeType(String),
    #[error("Volume must be a positive number")]
    InvalidVolume,
}

/// Turns master EA events into slave commands
#[derive(Debug, Default)]
pub struct CopyEngine;

impl CopyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate the fields every event needs. The api_key is checked by the caller.
    pub fn parse_signal(&self, req: &CopySignalRequest) -> Result<CopySignal, SignalError> {
        let event_name = non_empty(&req.event).ok_or(SignalError::MissingField("event"))?;
        let event = SignalEvent::parse(event_name)
            .ok_or_else(|| SignalError::UnknownEvent(event_name.to_string()))?;
        let master_account = non_empty(&req.account).ok_or(SignalError::MissingField("account"))?;
        let symbol = non_empty(&req.symbol).ok_or(SignalError::MissingField("symbol"))?;

        let trade_type = match non_empty(&req.trade_type) {
            Some(t) => {
                let upper = t.to_ascii_uppercase();
                if upper != "BUY" && upper != "SELL" {
                    return Err(SignalError::InvalidTradeType(t.to_string()));
                }
                Some(upper)
            }
            None if event == SignalEvent::Open => return Err(SignalError::MissingField("type")),
            None => None,
        };

        let volume = req.volume.unwrap_or(0.0);
        if event == SignalEvent::Open && (!volume.is_finite() || volume <= 0.0) {
            return Err(SignalError::InvalidVolume);
        }

        Ok(CopySignal {
            event,
            order_id: non_empty(&req.order_id).map(str::to_string),
            master_account: master_account.to_string(),
            symbol: symbol.to_string(),
            trade_type,
            volume,
            tp: req.tp,
            sl: req.sl,
        })
    }

    /// `COPY_<order_id>` lets the slave EA find the position again on close/modify
    pub fn comment_for(&self, signal: &CopySignal, pair: &CopyPair) -> String {
        match &signal.order_id {
            Some(order_id) => format!("COPY_{}", order_id),
            None => format!("Copy from Master {}", pair.master_account),
        }
    }

    /// Build the command for one slave. `None` means the event is not copied
    /// (a modify without TP/SL copying or without an order id).
    pub fn build_command(
        &self,
        signal: &CopySignal,
        pair: &CopyPair,
        symbol: &str,
        volume: Option<f64>,
    ) -> Option<TradeCommand> {
        let comment = self.comment_for(signal, pair);

        let mut command = match signal.event {
            SignalEvent::Open => {
                let action = match signal.trade_type.as_deref() {
                    Some("SELL") => CommandAction::Sell,
                    _ => CommandAction::Buy,
                };
                let mut cmd = TradeCommand::new(action, pair.slave_account.clone());
                cmd.order_type = Some(OrderType::Market);
                cmd.volume = volume;
                if pair.settings.copy_tp_sl {
                    cmd.take_profit = signal.tp;
                    cmd.stop_loss = signal.sl;
                }
                cmd
            }
            SignalEvent::Close if signal.order_id.is_some() => {
                let mut cmd = TradeCommand::new(CommandAction::Close, pair.slave_account.clone());
                cmd.command_type = Some("close_position".to_string());
                cmd.volume = volume;
                cmd
            }
            SignalEvent::Close => {
                tracing::warn!(
                    master = %pair.master_account,
                    slave = %pair.slave_account,
                    symbol = %symbol,
                    "Close event without order_id, closing every position of the symbol"
                );
                let mut cmd =
                    TradeCommand::new(CommandAction::CloseSymbol, pair.slave_account.clone());
                cmd.volume = volume;
                cmd
            }
            SignalEvent::Modify => {
                if !pair.settings.copy_tp_sl || signal.order_id.is_none() {
                    tracing::debug!(
                        pair_id = %pair.id,
                        "Modify event ignored (TP/SL copying disabled or no order_id)"
                    );
                    return None;
                }
                let mut cmd = TradeCommand::new(CommandAction::Modify, pair.slave_account.clone());
                cmd.command_type = Some("modify_position".to_string());
                cmd.take_profit = signal.tp;
                cmd.stop_loss = signal.sl;
                cmd
            }
        };

        command.symbol = Some(symbol.to_string());
        command.comment = Some(comment);
        command.copy_from = Some(pair.master_account.clone());
        Some(command)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
