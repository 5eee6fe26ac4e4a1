//! Structured logging built on `tracing`.
//!
//! The TUI owns the terminal, so when a log file is configured all output goes
//! through a non-blocking file appender. Without a file, logs go to stderr.

use std::path::{Path, PathBuf};

use parley_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ObservabilityError, Result};

/// Where log lines end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    Stderr,
}

/// Owns the installed subscriber's worker guard.
///
/// Dropping it flushes and stops the background writer, so keep it alive for
/// the lifetime of the process.
#[derive(Debug)]
pub struct LogManager {
    sink: LogSink,
    level: String,
    _guard: Option<WorkerGuard>,
}

impl LogManager {
    /// Install the global subscriber described by `config`
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let sink = Self::resolve_sink(config);
        let filter = Self::build_filter(&config.level.to_string())?;
        let level = config.level.to_string();

        let guard = match &sink {
            LogSink::File(path) => {
                let (dir, file_name) = split_log_path(path)?;
                std::fs::create_dir_all(&dir)?;
                let appender = tracing_appender::rolling::never(dir, file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);

                let registry = tracing_subscriber::registry().with(filter);
                let result = if config.json_format {
                    registry
                        .with(
                            tracing_subscriber::fmt::layer()
                                .json()
                                .with_writer(writer)
                                .with_ansi(false),
                        )
                        .try_init()
                } else {
                    registry
                        .with(
                            tracing_subscriber::fmt::layer()
                                .with_writer(writer)
                                .with_ansi(false)
                                .with_target(true),
                        )
                        .try_init()
                };
                result.map_err(|e| ObservabilityError::logging(e.to_string()))?;
                Some(guard)
            }
            LogSink::Stderr => {
                let registry = tracing_subscriber::registry().with(filter);
                let result = if config.json_format {
                    registry
                        .with(
                            tracing_subscriber::fmt::layer()
                                .json()
                                .with_writer(std::io::stderr),
                        )
                        .try_init()
                } else {
                    registry
                        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                        .try_init()
                };
                result.map_err(|e| ObservabilityError::logging(e.to_string()))?;
                None
            }
        };

        tracing::info!(
            target: "parley_observability",
            "Log manager initialized with level: {}",
            level
        );

        Ok(Self {
            sink,
            level,
            _guard: guard,
        })
    }

    /// `RUST_LOG` wins over the configured level when set
    pub fn build_filter(level: &str) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(level)
            .map_err(|e| ObservabilityError::config(format!("Invalid log level: {}", e)))
    }

    pub fn resolve_sink(config: &LoggingConfig) -> LogSink {
        match config.file.as_deref() {
            Some(file) if !file.trim().is_empty() => LogSink::File(
                parley_config::expand_tilde(file).unwrap_or_else(|| PathBuf::from(file)),
            ),
            _ => LogSink::Stderr,
        }
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn level(&self) -> &str {
        &self.level
    }
}

fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ObservabilityError::config(format!("Invalid log file path: {:?}", path)))?
        .to_string();
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, file_name))
}

/// Span wrapping one backend call
pub fn endpoint_span(method: &str, path: &str) -> tracing::Span {
    tracing::info_span!("endpoint", method = %method, path = %path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::LogLevel;

    #[test]
    fn test_resolve_sink() {
        let mut config = LoggingConfig::default();
        config.file = None;
        assert_eq!(LogManager::resolve_sink(&config), LogSink::Stderr);

        config.file = Some("/tmp/parley/test.log".to_string());
        assert_eq!(
            LogManager::resolve_sink(&config),
            LogSink::File(PathBuf::from("/tmp/parley/test.log"))
        );

        config.file = Some("   ".to_string());
        assert_eq!(LogManager::resolve_sink(&config), LogSink::Stderr);
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/parley.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(name, "parley.log");
        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_init_writes_to_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs").join("parley.log");
        let config = LoggingConfig {
            level: LogLevel::Debug,
            file: Some(log_path.to_string_lossy().into_owned()),
            json_format: false,
        };

        let manager = LogManager::init(&config).unwrap();
        assert_eq!(manager.level(), "debug");
        assert_eq!(manager.sink(), &LogSink::File(log_path.clone()));
        assert!(log_path.parent().unwrap().exists());
    }

    #[test]
    fn test_endpoint_span() {
        let span = endpoint_span("GET", "/chats");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "endpoint");
        }
    }
}
