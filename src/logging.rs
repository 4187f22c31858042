//! Logging setup and phase timing for pwmfit
//!
//! Installs a `tracing` subscriber writing human-readable or JSON records to
//! stderr or to a file in a log directory. `RUST_LOG` directives are layered
//! on top of the configured level.

use crate::error::{PwmError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        LevelFilter::from_level(level.into())
    }
}

impl FromStr for LogLevel {
    type Err = PwmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(PwmError::config(format!("Unknown log level '{}'", other))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level
    pub level: LogLevel,
    /// Enable structured JSON logging
    pub json_format: bool,
    /// Log file directory (None for stderr only)
    pub log_dir: Option<PathBuf>,
    /// Log file name inside `log_dir`
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            log_dir: None,
            log_file: "pwmfit.log".to_string(),
        }
    }
}

/// Keeps the non-blocking writer flushing until dropped
pub struct LoggingSystem {
    config: LoggingConfig,
    _guards: Vec<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber
    ///
    /// # Errors
    /// * `Io` - the log directory cannot be created
    /// * `Config` - a subscriber is already installed
    pub fn init(config: LoggingConfig) -> Result<Self> {
        let mut guards = Vec::new();

        let (writer, guard) = match &config.log_dir {
            Some(log_dir) => {
                fs::create_dir_all(log_dir)?;
                let file_appender = tracing_appender::rolling::never(log_dir, &config.log_file);
                tracing_appender::non_blocking(file_appender)
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };
        guards.push(guard);

        let format_layer = if config.json_format {
            fmt::layer().json().with_writer(writer).boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_ansi(config.log_dir.is_none())
                .with_writer(writer)
                .boxed()
        };

        let env_filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from(config.level).into())
            .from_env_lossy();

        tracing_subscriber::registry()
            .with(format_layer.with_filter(env_filter))
            .try_init()
            .map_err(|e| PwmError::config(format!("Failed to initialize logging: {}", e)))?;

        info!(config = ?config, "pwmfit logging initialized");

        Ok(Self {
            config,
            _guards: guards,
        })
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

/// Run `f` and log its wall time under `name`
pub fn time_operation<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    info!(
        operation = name,
        elapsed = %format_elapsed(elapsed),
        "Operation completed"
    );
    result
}

/// `H:MM:SS.mmm`
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    let hours = millis / 3_600_000;
    let minutes = millis / 60_000 % 60;
    let seconds = millis / 1000 % 60;
    format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_serialization() {
        let config = LoggingConfig::default();
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: LoggingConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1_234)), "0:00:01.234");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1:02:05.000");
    }

    #[test]
    fn test_time_operation_returns_result() {
        assert_eq!(time_operation("sum", || 2 + 2), 4);
    }
}
