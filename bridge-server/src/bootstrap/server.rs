use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

use crate::api::{create_router, AppState, RateLimiter};
use crate::bootstrap::{services::ServiceRegistry, Application};
use crate::config::Config;

/// Combine the services with the configuration into the router state
pub fn app_state(config: Arc<Config>, registry: ServiceRegistry) -> AppState {
    AppState {
        db: registry.db,
        supervisor: registry.supervisor,
        webhook: registry.webhook,
        copy_trade: registry.copy_trade,
        mapper: registry.mapper,
        symbols: registry.symbols,
        trade_history: registry.trade_history,
        copy_history: registry.copy_history,
        log_buffer: registry.log_buffer,
        rate_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
        allowed_origins: config.allowed_origins(),
        cors_disabled: config.cors.disable,
        config,
    }
}

pub fn setup(
    config: Config,
    registry: ServiceRegistry,
    log_guard: Option<WorkerGuard>,
) -> Result<Application> {
    let server_address = config.server_address();
    tracing::info!("Server will listen on: {}", server_address);

    let state = app_state(Arc::new(config), registry);
    if state.cors_disabled {
        tracing::warn!("CORS is DISABLED in config - all origins will be allowed!");
    } else {
        tracing::info!("API state created with CORS origins: {:?}", state.allowed_origins);
    }

    tracing::info!("Building API router...");
    let router = create_router(state);

    let socket_addr: SocketAddr = server_address
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", server_address, e))?;

    Ok(Application {
        router,
        bind_address: server_address,
        socket_addr,
        log_guard,
    })
}
