//! `tracing-subscriber` initialization.

use crate::errors::LoggingError;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Log subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Append logs to this file instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
            log_file: None,
        }
    }
}

impl LogConfig {
    /// JSON output with the default filter.
    #[must_use]
    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            ..Self::default()
        }
    }

    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sends output to a file.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over [`LogConfig::filter`].
///
/// # Errors
///
/// Fails if the filter is invalid, the log file cannot be opened, or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match (config.format, &config.log_file) {
        (LogFormat::Pretty, None) => builder.try_init(),
        (LogFormat::Json, None) => builder.json().try_init(),
        (LogFormat::Pretty, Some(path)) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(path)?))
            .try_init(),
        (LogFormat::Json, Some(path)) => builder
            .json()
            .with_writer(Mutex::new(open_log_file(path)?))
            .try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let log_file_error = |source| LoggingError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(log_file_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(log_file_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_defaults() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_log_config_builders() {
        let config = LogConfig::json().with_filter("devflow=debug").with_log_file("logs/run.log");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "devflow=debug");
        assert_eq!(config.log_file, Some(PathBuf::from("logs/run.log")));
    }

    #[test]
    fn test_open_log_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/system.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_file_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("file"), "").unwrap();
        let err = open_log_file(&dir.path().join("file/nested.log")).unwrap_err();
        assert!(matches!(err, LoggingError::LogFile { .. }));
    }

    #[test]
    fn test_second_init_fails() {
        let dir = TempDir::new().unwrap();
        let config = LogConfig::default().with_log_file(dir.path().join("devflow.log"));
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(LoggingError::Init(_))));
    }
}
