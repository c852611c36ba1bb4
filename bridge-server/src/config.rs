use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub mt5: Mt5Config,
    #[serde(default)]
    pub symbols: SymbolsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Credentials for the management API (HTTP Basic Authentication)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_basic_user")]
    pub basic_user: String,
    /// Empty means a random password is generated at startup
    #[serde(default)]
    pub basic_pass: String,
}

fn default_basic_user() -> String {
    "admin".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            basic_user: default_basic_user(),
            basic_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookConfig {
    /// Secret path segment of `POST /webhook/:token`. Empty means generated at startup.
    #[serde(default)]
    pub token: String,
    /// Public base URL used when reporting the webhook URL (e.g. behind a tunnel)
    #[serde(default)]
    pub external_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_webhook_per_minute")]
    pub webhook_per_minute: u32,
    #[serde(default = "default_copy_trade_per_minute")]
    pub copy_trade_per_minute: u32,
    #[serde(default = "default_api_per_hour")]
    pub api_per_hour: u32,
}

fn default_webhook_per_minute() -> u32 {
    10
}
fn default_copy_trade_per_minute() -> u32 {
    100
}
fn default_api_per_hour() -> u32 {
    100
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            webhook_per_minute: default_webhook_per_minute(),
            copy_trade_per_minute: default_copy_trade_per_minute(),
            api_per_hour: default_api_per_hour(),
        }
    }
}

/// MetaTrader 5 terminal and instance layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mt5Config {
    /// Path to terminal64.exe used to launch every instance
    #[serde(default = "default_main_path")]
    pub main_path: String,
    /// Root folder holding one isolated data folder per account
    #[serde(default = "default_instances_dir")]
    pub instances_dir: String,
    /// Folder copied into a new instance (profiles, config, MQL5)
    #[serde(default)]
    pub profile_source: String,
    /// Remove the instance folder when an account is deleted
    #[serde(default = "default_true")]
    pub delete_instance_files: bool,
    /// Instance-relative directories the command writer must never touch
    #[serde(default = "default_forbidden_subdirs")]
    pub forbidden_subdirs: Vec<String>,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
}

fn default_main_path() -> String {
    r"C:\Program Files\MetaTrader 5\terminal64.exe".to_string()
}
fn default_instances_dir() -> String {
    "mt5_instances".to_string()
}
fn default_true() -> bool {
    true
}
fn default_forbidden_subdirs() -> Vec<String> {
    vec!["Data".to_string()]
}
fn default_probe_interval_secs() -> u64 {
    30
}
fn default_stop_grace_secs() -> u64 {
    10
}
fn default_restart_delay_secs() -> u64 {
    2
}

impl Default for Mt5Config {
    fn default() -> Self {
        Self {
            main_path: default_main_path(),
            instances_dir: default_instances_dir(),
            profile_source: String::new(),
            delete_instance_files: true,
            forbidden_subdirs: default_forbidden_subdirs(),
            probe_interval_secs: default_probe_interval_secs(),
            stop_grace_secs: default_stop_grace_secs(),
            restart_delay_secs: default_restart_delay_secs(),
        }
    }
}

impl Mt5Config {
    pub fn instances_path(&self) -> PathBuf {
        PathBuf::from(&self.instances_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolsConfig {
    /// Minimum normalized Levenshtein similarity accepted by fuzzy matching
    #[serde(default = "default_fuzzy_match_threshold")]
    pub fuzzy_match_threshold: f64,
}

fn default_fuzzy_match_threshold() -> f64 {
    0.6
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: default_fuzzy_match_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Ring buffer capacity of both the trade and copy histories
    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,
}

fn default_history_max_entries() -> usize {
    1000
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_history_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://mt5_bridge.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    /// Disable CORS restrictions (allows all origins) - use only in development!
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub additional_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable file logging
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    /// Directory for log files (relative to executable or absolute path)
    #[serde(default = "default_log_directory")]
    pub directory: String,
    /// Prefix for log file names
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    /// Rotation strategy: "daily", "hourly", or "never"
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
    /// Maximum number of log files to keep (0 = unlimited)
    #[serde(default = "default_max_files")]
    pub max_files: u32,
    /// Maximum age of log files in days (0 = unlimited)
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

fn default_logging_enabled() -> bool {
    true
}
fn default_log_directory() -> String {
    "logs".to_string()
}
fn default_log_file_prefix() -> String {
    "mt5-bridge".to_string()
}
fn default_log_rotation() -> String {
    "daily".to_string()
}
fn default_max_files() -> u32 {
    30
}
fn default_max_age_days() -> u32 {
    90
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
            rotation: default_log_rotation(),
            max_files: default_max_files(),
            max_age_days: default_max_age_days(),
        }
    }
}

impl Config {
    /// Load config from layered TOML files
    ///
    /// Loads configuration files in the following order (later files override earlier):
    /// 1. {base_name}.toml (e.g., config.toml; built-in defaults if absent)
    /// 2. {base_name}.{ENV}.toml (optional, only if CONFIG_ENV is set)
    /// 3. {base_name}.local.toml (optional, for personal overrides, git-ignored)
    pub fn from_file<P: AsRef<Path>>(base_name: P) -> Result<Self> {
        let base_path = base_name.as_ref();
        let base_str = base_path.to_str().context("Invalid base path")?;

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(base_str).required(false));

        if let Ok(env) = std::env::var("CONFIG_ENV") {
            let env_config = format!("{}.{}", base_str, env);
            builder = builder.add_source(config::File::with_name(&env_config).required(false));
        }

        let local_config = format!("{}.local", base_str);
        builder = builder.add_source(config::File::with_name(&local_config).required(false));

        let config: Config = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the server cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.symbols.fuzzy_match_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!(
                "symbols.fuzzy_match_threshold must be within [0, 1], got {}",
                threshold
            );
        }
        if self.history.max_entries == 0 {
            bail!("history.max_entries must be greater than zero");
        }
        Ok(())
    }

    /// Fill in the webhook token and the Basic Auth password when left empty.
    ///
    /// Returns the names of the generated secrets so the caller can log them once.
    pub fn fill_generated_secrets(&mut self) -> Vec<&'static str> {
        let mut generated = Vec::new();
        if self.webhook.token.trim().is_empty() {
            self.webhook.token = uuid::Uuid::new_v4().simple().to_string();
            generated.push("webhook.token");
        }
        if self.auth.basic_pass.is_empty() {
            self.auth.basic_pass = uuid::Uuid::new_v4().simple().to_string()[..16].to_string();
            generated.push("auth.basic_pass");
        }
        generated
    }

    /// Get server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Full URL a signal provider should post to
    pub fn webhook_url(&self) -> String {
        let base = if self.webhook.external_base_url.trim().is_empty() {
            format!("http://localhost:{}", self.server.port)
        } else {
            self.webhook.external_base_url.trim_end_matches('/').to_string()
        };
        format!("{}/webhook/{}", base, self.webhook.token)
    }

    /// Get all allowed CORS origins
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![
            format!("http://localhost:{}", self.server.port),
            format!("http://127.0.0.1:{}", self.server.port),
        ];
        origins.extend(self.cors.additional_origins.clone());
        origins
    }
}
