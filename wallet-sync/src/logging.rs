//! Logging setup for the wallet.
//!
//! Console output goes to stderr. File output goes to `<log_dir>/wallet.log`;
//! the log of the previous run is archived under a timestamped name and only
//! the newest `max_files` archives are kept.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{LoggingError, LoggingResult};

const ARCHIVE_PREFIX: &str = "wallet-sync.";
const ACTIVE_LOG: &str = "wallet.log";

/// Keeps the non-blocking file writer alive. Dropping it flushes pending lines.
#[derive(Debug)]
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
}

/// Configuration for logging output.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter. `None` reads `RUST_LOG`, falling back to INFO.
    pub level: Option<LevelFilter>,
    /// Whether to output logs to stderr.
    pub console: bool,
    /// Optional file output.
    pub file: Option<LogFileConfig>,
}

/// Configuration for log file output.
#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub log_dir: PathBuf,
    /// Archived logs to keep.
    pub max_files: usize,
}

/// Console-only logging at `level`.
pub fn init_console_logging(level: LevelFilter) -> LoggingResult<LoggingGuard> {
    init_logging(LoggingConfig {
        level: Some(level),
        console: true,
        file: None,
    })
}

/// Install the global tracing subscriber.
///
/// With neither console nor file output enabled nothing is installed and the
/// tracing macros stay no-ops.
pub fn init_logging(config: LoggingConfig) -> LoggingResult<LoggingGuard> {
    if !config.console && config.file.is_none() {
        return Ok(LoggingGuard {
            _worker_guard: None,
        });
    }

    let filter = match config.level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(LevelFilter::INFO.to_string())),
    };

    let (file_layer, guard) = match config.file {
        Some(ref file_config) => {
            let (writer, guard) = open_log_file(file_config)?;
            let layer = fmt::layer().with_target(true).with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let console_layer = config.console.then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LoggingError::SubscriberInit(e.to_string()))?;

    Ok(LoggingGuard {
        _worker_guard: guard,
    })
}

fn open_log_file(config: &LogFileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.log_dir)?;
    archive_active_log(&config.log_dir)?;
    prune_archives(&config.log_dir, config.max_files)?;
    let file = File::create(config.log_dir.join(ACTIVE_LOG))?;
    Ok(tracing_appender::non_blocking(file))
}

/// Rename the previous run's log to `wallet-sync.<timestamp>.log`.
fn archive_active_log(log_dir: &Path) -> LoggingResult<()> {
    let active = log_dir.join(ACTIVE_LOG);
    if !active.exists() {
        return Ok(());
    }

    let stamp: DateTime<Local> = fs::metadata(&active)
        .and_then(|m| m.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| Local::now());
    let stamp = stamp.format("%Y%m%d-%H%M%S");

    let target = std::iter::once(format!("{}{}.log", ARCHIVE_PREFIX, stamp))
        .chain((1..100).map(|n| format!("{}{}-{}.log", ARCHIVE_PREFIX, stamp, n)))
        .map(|name| log_dir.join(name))
        .find(|path| !path.exists())
        .ok_or_else(|| LoggingError::RotationFailed("no free archive name".to_string()))?;

    fs::rename(&active, &target).map_err(|e| LoggingError::RotationFailed(e.to_string()))
}

/// Delete the oldest archives beyond `keep`. The active log is never touched.
fn prune_archives(log_dir: &Path, keep: usize) -> LoggingResult<()> {
    let mut archives: Vec<PathBuf> = fs::read_dir(log_dir)
        .map_err(|e| LoggingError::RotationFailed(e.to_string()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARCHIVE_PREFIX) && n.ends_with(".log"))
        })
        .collect();

    if archives.len() <= keep {
        return Ok(());
    }

    // Timestamped names sort oldest first.
    archives.sort();
    let excess = archives.len() - keep;
    for path in archives.into_iter().take(excess) {
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!("Failed to remove old log file {:?}: {}", path, e);
        }
    }
    Ok(())
}
