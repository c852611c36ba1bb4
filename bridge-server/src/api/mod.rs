//! Bridge Server REST API module
//!
//! Public routes (health, the token-protected webhook and the api_key-based
//! copy-trade ingestion) and Basic Auth protected management routes for
//! accounts, copy pairs, history, symbol mappings, SSE events and logs. Each
//! route class has its own rate limit.

mod accounts;
mod copy_pairs;
mod copy_trade;
mod error;
mod events;
mod health;
mod history;
mod logs;
mod middleware;
pub mod rate_limit;
mod symbols;
mod webhook;
mod webhook_accounts;

#[cfg(test)]
mod tests;

pub use error::{ApiResult, ProblemDetails};
pub use middleware::{decode_basic_credentials, require_basic_auth, BASIC_AUTH_CHALLENGE};
pub use rate_limit::{RateLimiter, RouteClass};

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

use crate::{
    config::Config,
    db::Database,
    history::HistoryLog,
    instances::InstanceSupervisor,
    log_buffer::LogBuffer,
    ports::SymbolSource,
    services::{CopyTradeService, SharedSymbolMapper, WebhookService},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub supervisor: Arc<InstanceSupervisor>,
    pub webhook: Arc<WebhookService>,
    pub copy_trade: Arc<CopyTradeService>,
    pub mapper: SharedSymbolMapper,
    pub symbols: Arc<dyn SymbolSource>,
    pub trade_history: Arc<HistoryLog>,
    pub copy_history: Arc<HistoryLog>,
    pub log_buffer: LogBuffer,
    pub rate_limiter: Arc<RateLimiter>,
    pub allowed_origins: Vec<String>,
    pub cors_disabled: bool,
}

pub fn create_router(state: AppState) -> Router {
    let cors = if state.cors_disabled {
        tracing::warn!(
            "CORS is DISABLED - allowing all origins. This should only be used in development!"
        );
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(
                state
                    .allowed_origins
                    .iter()
                    .filter_map(|origin| origin.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
            ])
            .allow_credentials(true)
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(tracing::Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let limiter = state.rate_limiter.clone();

    let webhook_routes = Router::new()
        .route("/webhook/:token", post(webhook::receive_webhook))
        .layer(axum_middleware::from_fn_with_state(
            (limiter.clone(), RouteClass::Webhook),
            rate_limit::rate_limit,
        ));

    let copy_trade_routes = Router::new()
        .route("/api/copy/trade", post(copy_trade::receive_signal))
        .layer(axum_middleware::from_fn_with_state(
            (limiter.clone(), RouteClass::CopyTrade),
            rate_limit::rate_limit,
        ));

    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/webhook", get(webhook::webhook_info))
        .route("/webhook/health", get(webhook::webhook_health));

    let protected_routes = Router::new()
        .route("/webhook-url", get(webhook::webhook_url))
        // Accounts
        .route(
            "/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route("/accounts/stats", get(accounts::account_stats))
        .route("/accounts/:account", delete(accounts::delete_account))
        .route("/accounts/:account/open", post(accounts::open_account))
        .route("/accounts/:account/stop", post(accounts::stop_account))
        .route("/accounts/:account/restart", post(accounts::restart_account))
        // Webhook allowlist
        .route(
            "/webhook-accounts",
            get(webhook_accounts::list_webhook_accounts)
                .post(webhook_accounts::upsert_webhook_account),
        )
        .route(
            "/webhook-accounts/:account",
            delete(webhook_accounts::delete_webhook_account),
        )
        // Copy pairs
        .route(
            "/api/copy/pairs",
            get(copy_pairs::list_pairs).post(copy_pairs::create_pair),
        )
        .route(
            "/api/copy/pairs/:id",
            get(copy_pairs::get_pair)
                .put(copy_pairs::update_pair)
                .delete(copy_pairs::delete_pair),
        )
        .route("/api/copy/pairs/:id/toggle", post(copy_pairs::toggle_pair))
        // History
        .route(
            "/api/copy/history",
            get(history::list_copy_history).delete(history::clear_copy_history),
        )
        .route(
            "/api/copy/history/clear",
            post(history::clear_copy_history_confirmed),
        )
        .route("/api/copy/history/stats", get(history::copy_history_stats))
        .route(
            "/trades",
            get(history::list_trades).delete(history::clear_trades),
        )
        .route("/trades/clear", post(history::clear_trades_confirmed))
        // Server-sent events
        .route("/events/trades", get(events::trade_events))
        .route("/events/copy-trades", get(events::copy_trade_events))
        // Symbols
        .route(
            "/api/symbols/mappings",
            get(symbols::list_mappings).post(symbols::upsert_mapping),
        )
        .route(
            "/api/symbols/mappings/:input",
            delete(symbols::delete_mapping),
        )
        .route("/api/symbols/test", post(symbols::test_mapping))
        .route("/api/symbols/stats", get(symbols::mapping_stats))
        .route("/api/logs", get(logs::get_logs))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ))
        .layer(axum_middleware::from_fn_with_state(
            (limiter, RouteClass::Api),
            rate_limit::rate_limit,
        ));

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(copy_trade_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
