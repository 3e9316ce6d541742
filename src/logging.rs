//! Logging setup with optional daily-rotated file output

use crate::error::{Result, SensorError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILE_NAME: &str = "pollsense.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` does not say otherwise
    pub level: String,

    /// Log file; rotated daily next to the given path
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    /// Include thread IDs
    pub thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            stderr: true,
            thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `RUST_LOG`, `POLLSENSE_LOG_FILE` and `POLLSENSE_LOG_STDERR`
    pub fn apply_env(&mut self) {
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if let Some(level) = ["trace", "debug", "info", "warn", "error"]
                .into_iter()
                .find(|level| rust_log.contains(level))
            {
                self.level = level.to_string();
            }
        }

        if let Ok(log_file) = std::env::var("POLLSENSE_LOG_FILE") {
            self.file_path = Some(PathBuf::from(log_file));
        }

        if let Ok(log_stderr) = std::env::var("POLLSENSE_LOG_STDERR") {
            self.stderr = log_stderr.to_lowercase() != "false";
        }
    }

    /// Parsed default level
    pub fn level(&self) -> Result<Level> {
        Level::from_str(self.level.trim())
            .map_err(|_| SensorError::config(format!("Unknown log level '{}'", self.level)))
    }
}

/// Initialize the global subscriber
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level()?.into())
        .from_env_lossy();

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(config.thread_ids)
    });

    let file_layer = match &config.file_path {
        Some(file_path) => {
            let directory = file_path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory)?;

            let file_name = file_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new(DEFAULT_LOG_FILE_NAME));
            let file_appender = tracing_appender::rolling::daily(directory, file_name);

            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_thread_ids(config.thread_ids),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SensorError::config(format!("Failed to initialize logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("RUST_LOG", Some("pollsense=debug")),
                ("POLLSENSE_LOG_FILE", Some("/tmp/pollsense/poll.log")),
                ("POLLSENSE_LOG_STDERR", Some("FALSE")),
            ],
            || {
                let config = LogConfig::from_env();
                assert_eq!(config.level, "debug");
                assert_eq!(
                    config.file_path,
                    Some(PathBuf::from("/tmp/pollsense/poll.log"))
                );
                assert!(!config.stderr);
            },
        );
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogConfig::default().level().unwrap(), Level::INFO);

        let bad = LogConfig {
            level: "loud".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(bad.level(), Err(SensorError::Config(_))));
    }
}
