//! Tracing subscriber setup
//!
//! stdout, the in-memory `LogBuffer` behind `/api/logs` and, when enabled, a
//! rolling log file.

use crate::config::LoggingConfig;
use crate::log_buffer::{LogBuffer, LogBufferLayer};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init(config: &LoggingConfig, log_buffer: LogBuffer) -> Option<WorkerGuard> {
    // RUST_LOG overrides the default level
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(LogBufferLayer::new(log_buffer));

    if !config.enabled {
        subscriber.init();
        return None;
    }

    use tracing_appender::rolling;

    if let Err(e) = std::fs::create_dir_all(&config.directory) {
        eprintln!("Failed to create log directory {}: {}", config.directory, e);
    }
    cleanup_old_logs(config);

    let file_appender = match config.rotation.as_str() {
        "hourly" => rolling::hourly(&config.directory, &config.file_prefix),
        "never" => rolling::never(&config.directory, &config.file_prefix),
        _ => rolling::daily(&config.directory, &config.file_prefix),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    subscriber
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}

/// Delete log files beyond `max_files` (newest kept) or older than
/// `max_age_days`. Zero disables the respective limit. Returns the number of
/// files removed.
pub fn cleanup_old_logs(config: &LoggingConfig) -> usize {
    if config.max_files == 0 && config.max_age_days == 0 {
        return 0;
    }

    let mut log_files = match list_log_files(Path::new(&config.directory), &config.file_prefix) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Failed to read log directory {}: {}", config.directory, e);
            return 0;
        }
    };

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let now = SystemTime::now();
    let max_age = Duration::from_secs(u64::from(config.max_age_days) * 24 * 60 * 60);
    let mut deleted = 0;

    for (idx, (path, modified)) in log_files.iter().enumerate() {
        let too_many = config.max_files > 0 && idx >= config.max_files as usize;
        let too_old = config.max_age_days > 0
            && now
                .duration_since(*modified)
                .is_ok_and(|age| age > max_age);

        if too_many || too_old {
            match std::fs::remove_file(path) {
                Ok(()) => deleted += 1,
                Err(e) => eprintln!("Failed to delete log file {}: {}", path.display(), e),
            }
        }
    }

    if deleted > 0 {
        eprintln!("Cleaned up {} old log file(s)", deleted);
    }
    deleted
}

fn list_log_files(dir: &Path, prefix: &str) -> std::io::Result<Vec<(PathBuf, SystemTime)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() || !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        files.push((entry.path(), metadata.modified()?));
    }
    Ok(files)
}
