use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::Config;
use crate::log_buffer::LogBuffer;

pub mod logging;
pub mod server;
pub mod services;

pub struct Application {
    pub router: Router,
    pub bind_address: String,
    pub socket_addr: SocketAddr,
    /// Flushes the log file on drop
    pub log_guard: Option<WorkerGuard>,
}

pub async fn setup() -> Result<Application> {
    // 1. Load Configuration
    let mut config = load_config();

    // 2. Setup Logging
    let log_buffer = LogBuffer::default();
    let log_guard = logging::setup(&config, log_buffer.clone());

    // 3. Secrets left empty in the config are generated once per start
    for secret in config.fill_generated_secrets() {
        let value = match secret {
            "webhook.token" => &config.webhook.token,
            _ => &config.auth.basic_pass,
        };
        tracing::warn!("{} was not configured, generated for this run: {}", secret, value);
    }

    // 4. Setup Services & Background Tasks
    let registry = services::setup(&config, log_buffer).await?;

    // 5. Setup Server (API)
    server::setup(config, registry, log_guard)
}

fn load_config() -> Config {
    // Determine config directory
    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_string_lossy().into_owned()))
            .unwrap_or_else(|| ".".to_string())
    });
    let config_base = format!("{}/config", config_dir);

    eprintln!(
        "Config directory: {}, config base: {}",
        config_dir, config_base
    );

    match Config::from_file(&config_base) {
        Ok(cfg) => {
            eprintln!("Configuration loaded successfully from {}", config_base);
            cfg
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {}, using defaults", e);
            Config::default()
        }
    }
}
