//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins over the configured level
//! when set; otherwise the gateway logs at `travel_gateway=<level>`.

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Logging section of the gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Parsed level, falling back to INFO for unknown names
    pub fn parsed_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn default_directive(&self) -> String {
        format!(
            "travel_gateway={},tower_http=info",
            self.parsed_level().as_str().to_lowercase()
        )
    }
}

/// Initialize the global tracing subscriber
///
/// Calling this twice (tests, embedded use) logs a warning instead of failing.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init(),
    };

    if result.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
        return;
    }

    info!(level = %config.level, format = ?config.format, "Structured logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = LoggingConfig {
            level: "verbose".to_string(),
            format: LogFormat::Text,
        };
        assert_eq!(config.parsed_level(), Level::INFO);
        assert_eq!(config.default_directive(), "travel_gateway=info,tower_http=info");
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let config: LoggingConfig = serde_yaml::from_str("level: debug\nformat: text\n").unwrap();
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.parsed_level(), Level::DEBUG);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
