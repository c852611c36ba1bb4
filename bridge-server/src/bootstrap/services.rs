use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::adapters::outbound::{
    AccountInfoBalanceSource, FileCommandSink, MarketWatchSymbolSource, OsProcessControl,
};
use crate::config::Config;
use crate::db::{Database, HistoryKind};
use crate::domain::services::SymbolMapper;
use crate::history::HistoryLog;
use crate::instances::{InstanceSupervisor, LivenessMonitor, SupervisorSettings};
use crate::log_buffer::LogBuffer;
use crate::ports::{
    AccountDirectory, BalanceSource, CommandSink, ProcessControl, RoutingRepository, SymbolSource,
};
use crate::services::{CopyTradeService, SharedSymbolMapper, WebhookService};

pub struct ServiceRegistry {
    pub db: Arc<Database>,
    pub supervisor: Arc<InstanceSupervisor>,
    pub webhook: Arc<WebhookService>,
    pub copy_trade: Arc<CopyTradeService>,
    pub mapper: SharedSymbolMapper,
    pub symbols: Arc<dyn SymbolSource>,
    pub trade_history: Arc<HistoryLog>,
    pub copy_history: Arc<HistoryLog>,
    pub log_buffer: LogBuffer,
}

/// Open the database, wire the services and start the liveness monitor
pub async fn setup(config: &Config, log_buffer: LogBuffer) -> Result<ServiceRegistry> {
    // Initialize database
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| config.database.url.clone());
    let db = Arc::new(Database::new(&database_url).await?);
    tracing::info!("Database initialized: {}", database_url);

    let instances_dir = config.mt5.instances_path();
    tokio::fs::create_dir_all(&instances_dir)
        .await
        .with_context(|| format!("Failed to create instances folder {}", instances_dir.display()))?;

    let registry = build(config, db, Arc::new(OsProcessControl::new()), log_buffer).await?;

    // Reconcile stored statuses with the processes that actually survived a restart
    match registry.supervisor.probe_all().await {
        Ok(transitions) => tracing::info!(changed = transitions.len(), "Initial liveness probe finished"),
        Err(e) => tracing::error!(error = %e, "Initial liveness probe failed"),
    }

    tracing::info!("Spawning liveness monitor task...");
    let monitor = LivenessMonitor::new(
        registry.supervisor.clone(),
        Duration::from_secs(config.mt5.probe_interval_secs.max(1)),
    );
    tokio::spawn(async move {
        monitor.run().await;
    });

    Ok(registry)
}

/// Wire every service over `db` and `process`. Starts no background task.
pub async fn build(
    config: &Config,
    db: Arc<Database>,
    process: Arc<dyn ProcessControl>,
    log_buffer: LogBuffer,
) -> Result<ServiceRegistry> {
    let cap = config.history.max_entries;
    let trade_history =
        Arc::new(HistoryLog::new(HistoryKind::Trades, cap).with_database(db.clone()));
    let copy_history =
        Arc::new(HistoryLog::new(HistoryKind::CopyTrades, cap).with_database(db.clone()));
    let trades = trade_history
        .load()
        .await
        .context("Failed to load trade history")?;
    let copies = copy_history
        .load()
        .await
        .context("Failed to load copy history")?;
    tracing::info!(trades, copies, cap, "History loaded");

    let custom = db
        .list_symbol_mappings()
        .await
        .context("Failed to load custom symbol mappings")?;
    let mapper = SymbolMapper::new(config.symbols.fuzzy_match_threshold)?
        .with_custom_mappings(custom);
    tracing::info!(
        custom = mapper.custom_mappings().len(),
        threshold = mapper.threshold(),
        "Symbol mapper initialized"
    );
    let mapper: SharedSymbolMapper = Arc::new(RwLock::new(mapper));

    let supervisor = Arc::new(
        InstanceSupervisor::new(db.clone(), process, SupervisorSettings::from_config(&config.mt5))
            .with_histories(vec![trade_history.clone()]),
    );

    let instances_dir = config.mt5.instances_path();
    let sink: Arc<dyn CommandSink> = Arc::new(FileCommandSink::new(
        instances_dir.clone(),
        &config.mt5.forbidden_subdirs,
    ));
    let symbols: Arc<dyn SymbolSource> =
        Arc::new(MarketWatchSymbolSource::new(instances_dir.clone()));
    let balances: Arc<dyn BalanceSource> = Arc::new(AccountInfoBalanceSource::new(instances_dir));
    let accounts: Arc<dyn AccountDirectory> = supervisor.clone();
    let routing: Arc<dyn RoutingRepository> = db.clone();

    let webhook = Arc::new(WebhookService::new(
        accounts.clone(),
        routing.clone(),
        symbols.clone(),
        sink.clone(),
        mapper.clone(),
        trade_history.clone(),
    ));
    let copy_trade = Arc::new(CopyTradeService::new(
        accounts,
        routing,
        symbols.clone(),
        balances,
        sink,
        mapper.clone(),
        copy_history.clone(),
    ));

    Ok(ServiceRegistry {
        db,
        supervisor,
        webhook,
        copy_trade,
        mapper,
        symbols,
        trade_history,
        copy_history,
        log_buffer,
    })
}
