use crate::log_buffer::LogBuffer;
use crate::logging;
use tracing_appender::non_blocking::WorkerGuard;

pub fn setup(config: &crate::config::Config, log_buffer: LogBuffer) -> Option<WorkerGuard> {
    let guard = logging::init(&config.logging, log_buffer);

    tracing::info!("Starting MT5 Bridge Server...");
    tracing::info!("Server Version: {}", env!("BUILD_INFO"));

    if config.logging.enabled {
        tracing::info!(
            "File logging enabled: directory={}, prefix={}, rotation={}",
            config.logging.directory,
            config.logging.file_prefix,
            config.logging.rotation
        );
    }
    tracing::info!(
        instances_dir = %config.mt5.instances_dir,
        probe_interval_secs = config.mt5.probe_interval_secs,
        fuzzy_match_threshold = config.symbols.fuzzy_match_threshold,
        history_cap = config.history.max_entries,
        "Configuration summary"
    );

    guard
}
