use crate::history::HistoryLog;
use crate::models::{
    CommandKind, DeliveryResult, DispatchSummary, HistoryEntry, InstanceStatus, TradeCommand,
    WebhookOrder,
};
use crate::ports::{AccountDirectory, CommandSink, RoutingRepository, SymbolSource};
use crate::services::SharedSymbolMapper;
use std::collections::HashSet;
use std::sync::Arc;

/// Fans a validated webhook order out to its destination accounts
pub struct WebhookService {
    accounts: Arc<dyn AccountDirectory>,
    routing: Arc<dyn RoutingRepository>,
    symbols: Arc<dyn SymbolSource>,
    sink: Arc<dyn CommandSink>,
    mapper: SharedSymbolMapper,
    history: Arc<HistoryLog>,
}

impl WebhookService {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        routing: Arc<dyn RoutingRepository>,
        symbols: Arc<dyn SymbolSource>,
        sink: Arc<dyn CommandSink>,
        mapper: SharedSymbolMapper,
        history: Arc<HistoryLog>,
    ) -> Self {
        Self {
            accounts,
            routing,
            symbols,
            sink,
            mapper,
            history,
        }
    }

    /// Deliver `order` to every destination account.
    ///
    /// Each account is checked independently (allowlist, registered, online,
    /// symbol available) and every outcome is recorded in the trade history.
    /// The summary is successful when at least one account accepted the command.
    pub async fn dispatch(&self, order: &WebhookOrder) -> DispatchSummary {
        let allowed = self.allowed_accounts().await;

        let mut results = Vec::with_capacity(order.accounts.len());
        for account in &order.accounts {
            let result = match self.deliver_to(order, account, allowed.as_ref()).await {
                Ok(symbol) => DeliveryResult {
                    account: account.clone(),
                    success: true,
                    message: format!("{} command sent to EA", order.action.as_str()),
                    symbol,
                },
                Err((message, symbol)) => {
                    tracing::warn!(account = %account, action = order.action.as_str(), error = %message, "Webhook delivery declined");
                    DeliveryResult {
                        account: account.clone(),
                        success: false,
                        message,
                        symbol,
                    }
                }
            };
            self.record(order, &result).await;
            results.push(result);
        }

        let summary = DispatchSummary::from_results(order.action.as_str(), "accounts", results);
        tracing::info!(
            action = order.action.as_str(),
            success = summary.success,
            "{}",
            summary.message
        );
        summary
    }

    /// `None` when the allowlist is empty, which lets every account through
    async fn allowed_accounts(&self) -> Option<HashSet<String>> {
        match self.routing.list_webhook_accounts().await {
            Ok(entries) if entries.is_empty() => None,
            Ok(entries) => Some(
                entries
                    .into_iter()
                    .filter(|e| e.enabled)
                    .map(|e| e.account)
                    .collect(),
            ),
            Err(e) => {
                // Fail closed: nothing passes an allowlist we cannot read
                tracing::error!(error = %e, "Failed to load webhook allowlist");
                Some(HashSet::new())
            }
        }
    }

    /// Returns the symbol sent on success; on failure the reason and the
    /// symbol as far as it was resolved.
    async fn deliver_to(
        &self,
        order: &WebhookOrder,
        account: &str,
        allowed: Option<&HashSet<String>>,
    ) -> Result<Option<String>, (String, Option<String>)> {
        let raw_symbol = order.symbol.clone();
        let fail = |message: String| (message, raw_symbol.clone());

        if allowed.is_some_and(|set| !set.contains(account)) {
            return Err(fail(format!("Account {} is not allowed for webhook trading", account)));
        }

        match self.accounts.refresh_account(account).await {
            Ok(Some(acc)) if acc.status == InstanceStatus::Online => {}
            Ok(Some(_)) => return Err(fail(format!("Account {} is offline", account))),
            Ok(None) => return Err(fail(format!("Account {} not found in system", account))),
            Err(e) => return Err(fail(format!("Failed to check account {}: {}", account, e))),
        }

        let symbol = match &order.symbol {
            Some(raw) => {
                let available = self.symbols.available_symbols(account).await;
                let mapped = self
                    .mapper
                    .read()
                    .await
                    .map_symbol(raw, &available)
                    .map_err(|_| fail(format!("Cannot map symbol: {}", raw)))?;
                if !mapped.symbol.eq_ignore_ascii_case(raw) {
                    tracing::info!(account = %account, from = %raw, to = %mapped.symbol, kind = ?mapped.kind, "Symbol mapped");
                }
                Some(mapped.symbol)
            }
            None => None,
        };

        let command = build_command(order, account, symbol.clone());

        let _guard = self.accounts.lock_account(account).await;
        self.sink
            .deliver(account, CommandKind::Webhook, &command)
            .await
            .map_err(|e| (format!("Failed to write command file: {}", e), symbol.clone()))?;
        Ok(symbol)
    }

    async fn record(&self, order: &WebhookOrder, result: &DeliveryResult) {
        let entry = if result.success {
            HistoryEntry::success(order.action.as_str(), result.message.clone())
        } else {
            HistoryEntry::error(order.action.as_str(), result.message.clone())
        };
        self.history
            .record(
                entry
                    .with_account(result.account.clone())
                    .with_symbol(result.symbol.clone())
                    .with_volume(order.volume)
                    .with_price(order.price),
            )
            .await;
    }
}

fn build_command(order: &WebhookOrder, account: &str, symbol: Option<String>) -> TradeCommand {
    let mut command = TradeCommand::new(order.action.command_action(), account);
    command.symbol = symbol;
    if order.action.opens_position() {
        command.order_type = Some(order.order_type);
        command.price = order.price;
    }
    command.volume = order.volume;
    command.take_profit = order.take_profit;
    command.stop_loss = order.stop_loss;
    command.ticket = order.ticket;
    command.position_type = order.position_type.clone();
    command.comment = order.comment.clone();
    command
}
