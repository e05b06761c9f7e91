//! Structured logging setup.
//!
//! keel only emits `tracing` events. This module installs a subscriber for
//! binaries that want the stock setup:
//!
//! - `LOG_FORMAT`: `json` (default) or `text` / `pretty`
//! - `RUST_LOG`: filter directives (default: the configured level, `info`)

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per event (production).
    #[default]
    Json,
    /// Human-readable lines (development).
    Text,
}

impl LogFormat {
    /// `text` and `pretty` select [`LogFormat::Text`]; anything else is JSON.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Self::Text,
            _ => Self::Json,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset or invalid.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: LogFormat::Json, level: "info".to_owned() }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(false)).try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_names() {
        assert_eq!(LogFormat::parse("TEXT"), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Json);
    }

    #[test]
    fn second_init_is_harmless() {
        let config = LoggingConfig { format: LogFormat::Text, level: "debug".to_owned() };
        init_logging(&config);
        init_logging(&config);
    }
}
