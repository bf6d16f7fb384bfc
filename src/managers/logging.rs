//! Logging manager with optional file rotation
//!
//! Provides:
//! - Console: configured level, concise format on stderr
//! - File: same level, daily rotation, when a log directory is configured

use crate::config::{expand_tilde, LogSettings};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "juju-backup-all";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files; console only when `None`
    pub log_directory: Option<PathBuf>,
    pub log_level: Level,
    /// Maximum number of log files to keep
    pub max_files: u32,
    /// JSON lines in the log file
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: None,
            log_level: Level::INFO,
            max_files: 10,
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self {
            log_directory: settings.directory.clone(),
            log_level: parse_level(&settings.level),
            max_files: settings.max_files,
            json: settings.json,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" | "critical" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging
///
/// Keep the returned guard alive for the duration of the program; dropping
/// it flushes the file writer.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let mut log_dir = None;
    let mut file_guard = None;
    let mut file_layer: Option<Box<dyn Layer<Registry> + Send + Sync>> = None;

    if let Some(directory) = &config.log_directory {
        let dir = expand_tilde(directory);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {:?}", dir))?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &dir, format!("{}.log", LOG_FILE_PREFIX));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        file_layer = Some(if config.json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(level_filter(config.log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_filter(level_filter(config.log_level))
                .boxed()
        });
        file_guard = Some(guard);
        log_dir = Some(dir);
    }

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_filter(level_filter(config.log_level));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    if let Some(dir) = log_dir {
        cleanup_old_logs(&dir, config.max_files)?;
    }

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Console-only logging for before the configuration is known
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `RUST_LOG` wins over the configured level
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Keep only the newest `max_files` log files
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(LOG_FILE_PREFIX)
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    for file in log_files.into_iter().skip(max_files as usize) {
        if let Err(e) = fs::remove_file(file.path()) {
            tracing::warn!("Failed to remove old log file {:?}: {}", file.path(), e);
        } else {
            tracing::debug!("Removed old log file: {:?}", file.path());
        }
    }

    Ok(())
}

/// Guard that keeps the file writer alive
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}
