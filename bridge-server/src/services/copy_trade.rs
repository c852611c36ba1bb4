//! Copy-trade signal processing
//!
//! A master EA posts one event per trade. The api_key selects the copy pairs
//! (one key may fan out to several slaves of the same master); each active
//! pair gets its own mapped symbol, volume and command file.

use crate::domain::services::{
    calculate_volume, BalanceSnapshot, CopyEngine, SignalError, VolumeError,
};
use crate::history::HistoryLog;
use crate::models::{
    CommandKind, CopyPair, CopySignal, CopySignalRequest, DeliveryResult, DispatchSummary,
    HistoryEntry, InstanceStatus, SignalEvent, VolumeMode,
};
use crate::ports::{AccountDirectory, BalanceSource, CommandSink, RoutingRepository, SymbolSource};
use crate::services::SharedSymbolMapper;
use std::sync::Arc;
use thiserror::Error;

/// Why a signal was rejected before any slave was tried
#[derive(Debug, Error)]
pub enum CopyTradeError {
    #[error("api_key is required")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Account number does not match master account")]
    MasterMismatch,
    #[error("Copy pair is inactive")]
    Inactive,
    #[error(transparent)]
    InvalidSignal(#[from] SignalError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct CopyTradeService {
    accounts: Arc<dyn AccountDirectory>,
    routing: Arc<dyn RoutingRepository>,
    symbols: Arc<dyn SymbolSource>,
    balances: Arc<dyn BalanceSource>,
    sink: Arc<dyn CommandSink>,
    mapper: SharedSymbolMapper,
    history: Arc<HistoryLog>,
    engine: CopyEngine,
}

/// One slave's outcome, kept for the history entry
struct PairOutcome {
    success: bool,
    message: String,
    symbol: String,
    volume: Option<f64>,
}

impl CopyTradeService {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        routing: Arc<dyn RoutingRepository>,
        symbols: Arc<dyn SymbolSource>,
        balances: Arc<dyn BalanceSource>,
        sink: Arc<dyn CommandSink>,
        mapper: SharedSymbolMapper,
        history: Arc<HistoryLog>,
    ) -> Self {
        Self {
            accounts,
            routing,
            symbols,
            balances,
            sink,
            mapper,
            history,
            engine: CopyEngine::new(),
        }
    }

    pub async fn process_signal(
        &self,
        req: &CopySignalRequest,
    ) -> Result<DispatchSummary, CopyTradeError> {
        let api_key = req
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(CopyTradeError::MissingApiKey)?;

        let pairs = self.routing.copy_pairs_by_api_key(api_key).await?;
        if pairs.is_empty() {
            tracing::warn!("Copy signal with unknown api_key rejected");
            return Err(CopyTradeError::InvalidApiKey);
        }

        let signal = self.engine.parse_signal(req)?;

        let pairs: Vec<CopyPair> = pairs
            .into_iter()
            .filter(|p| p.master_account == signal.master_account)
            .collect();
        if pairs.is_empty() {
            return Err(CopyTradeError::MasterMismatch);
        }

        let active: Vec<&CopyPair> = pairs.iter().filter(|p| p.is_active()).collect();
        if active.is_empty() {
            return Err(CopyTradeError::Inactive);
        }

        tracing::info!(
            master = %signal.master_account,
            event = ?signal.event,
            symbol = %signal.symbol,
            order_id = ?signal.order_id,
            slaves = active.len(),
            "Processing copy signal"
        );

        let mut results = Vec::with_capacity(active.len());
        for pair in active {
            let outcome = self.copy_to_slave(&signal, pair).await;
            self.record(&signal, pair, &outcome).await;
            results.push(DeliveryResult {
                account: pair.slave_account.clone(),
                success: outcome.success,
                message: outcome.message,
                symbol: Some(outcome.symbol),
            });
        }

        Ok(DispatchSummary::from_results(
            event_label(&signal),
            "slave accounts",
            results,
        ))
    }

    async fn copy_to_slave(&self, signal: &CopySignal, pair: &CopyPair) -> PairOutcome {
        let slave = pair.slave_account.as_str();
        let declined = |message: String, symbol: &str| {
            tracing::warn!(pair_id = %pair.id, slave = %slave, error = %message, "Copy declined");
            PairOutcome {
                success: false,
                message,
                symbol: symbol.to_string(),
                volume: None,
            }
        };

        match self.accounts.refresh_account(slave).await {
            Ok(Some(acc)) if acc.status == InstanceStatus::Online => {}
            Ok(Some(_)) => {
                return declined(format!("Slave account {} is offline", slave), &signal.symbol)
            }
            Ok(None) => {
                return declined(format!("Slave account {} not found", slave), &signal.symbol)
            }
            Err(e) => {
                return declined(
                    format!("Failed to check slave account {}: {}", slave, e),
                    &signal.symbol,
                )
            }
        }

        let symbol = if pair.settings.auto_map_symbol {
            let available = self.symbols.available_symbols(slave).await;
            match self.mapper.read().await.map_symbol(&signal.symbol, &available) {
                Ok(mapped) => mapped.symbol,
                Err(_) => {
                    return declined(
                        format!("Cannot map symbol: {}", signal.symbol),
                        &signal.symbol,
                    )
                }
            }
        } else {
            signal.symbol.clone()
        };

        let volume = match self.slave_volume(signal, pair).await {
            Ok(volume) => volume,
            Err(e) => return declined(format!("Volume calculation failed: {}", e), &symbol),
        };

        let Some(command) = self.engine.build_command(signal, pair, &symbol, volume) else {
            return PairOutcome {
                success: true,
                message: "Modify not copied (TP/SL copying disabled or no order id)".to_string(),
                symbol,
                volume,
            };
        };

        let _guard = self.accounts.lock_account(slave).await;
        match self.sink.deliver(slave, CommandKind::CopyTrade, &command).await {
            Ok(_) => PairOutcome {
                success: true,
                message: format!(
                    "{} {} copied to slave account {}",
                    command.action, symbol, slave
                ),
                symbol,
                volume,
            },
            Err(e) => declined(format!("Failed to write command file: {}", e), &symbol),
        }
    }

    /// Open events must size successfully; a close whose size cannot be
    /// computed falls back to closing the whole position.
    async fn slave_volume(
        &self,
        signal: &CopySignal,
        pair: &CopyPair,
    ) -> Result<Option<f64>, VolumeError> {
        let settings = &pair.settings;
        match signal.event {
            SignalEvent::Modify => Ok(None),
            SignalEvent::Open if !settings.auto_map_volume => Ok(Some(signal.volume)),
            SignalEvent::Close if !settings.auto_map_volume => Ok(None),
            SignalEvent::Open | SignalEvent::Close => {
                let snapshot = if settings.volume_mode == VolumeMode::Percent {
                    Some(BalanceSnapshot {
                        master_account: &pair.master_account,
                        master_balance: self.balances.balance(&pair.master_account).await,
                        slave_account: &pair.slave_account,
                        slave_balance: self.balances.balance(&pair.slave_account).await,
                    })
                } else {
                    None
                };

                let result = calculate_volume(
                    signal.volume,
                    settings.volume_mode,
                    settings.multiplier,
                    snapshot.as_ref(),
                );
                match (signal.event, result) {
                    (SignalEvent::Close, Err(e)) => {
                        tracing::debug!(pair_id = %pair.id, error = %e, "Close volume unavailable, closing in full");
                        Ok(None)
                    }
                    (_, result) => result.map(Some),
                }
            }
        }
    }

    async fn record(&self, signal: &CopySignal, pair: &CopyPair, outcome: &PairOutcome) {
        let entry = if outcome.success {
            HistoryEntry::success(event_label(signal), outcome.message.clone())
        } else {
            HistoryEntry::error(event_label(signal), outcome.message.clone())
        };
        self.history
            .record(
                entry
                    .with_pair(
                        pair.master_account.clone(),
                        pair.slave_account.clone(),
                        Some(pair.id.clone()),
                    )
                    .with_symbol(Some(outcome.symbol.clone()))
                    .with_volume(outcome.volume.or(Some(signal.volume).filter(|v| *v > 0.0))),
            )
            .await;
    }
}

/// BUY / SELL for opens, CLOSE / MODIFY otherwise
fn event_label(signal: &CopySignal) -> &str {
    match signal.event {
        SignalEvent::Open => signal.trade_type.as_deref().unwrap_or("OPEN"),
        SignalEvent::Close => "CLOSE",
        SignalEvent::Modify => "MODIFY",
    }
}
