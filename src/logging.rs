//! Tracing subscriber setup shared by the binaries.

use std::fs::OpenOptions;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directives}': {message}")]
    Filter { directives: String, message: String },

    #[error("Failed to open log file {path}: {error}")]
    File { path: String, error: String },

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Output goes to stderr unless
/// a log file is configured, and is either human readable (`pretty`) or one
/// JSON object per line (`json`).
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.level)?,
    };

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| LoggingError::File {
                    path: path.clone(),
                    error: e.to_string(),
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let (json, pretty) = match config.format.as_str() {
        "json" => (
            Some(fmt::layer().json().with_current_span(false).with_writer(writer)),
            None,
        ),
        _ => (
            None,
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(config.file.is_none())
                    .with_writer(writer),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

/// Filter used when `RUST_LOG` is unset
pub fn default_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = format!("mql={level},tower_http={level}");
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::Filter {
        directives,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(default_filter(level).is_ok(), "{level}");
        }
    }

    #[test]
    fn test_default_filter_rejects_unknown_level() {
        let err = default_filter("loud").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
        assert!(err.to_string().contains("mql=loud"));
    }

    #[test]
    fn test_unwritable_log_file() {
        let config = LoggingConfig {
            file: Some("/nonexistent/dir/mql.log".to_string()),
            ..LoggingConfig::default()
        };

        let err = init_tracing(&config).unwrap_err();
        assert!(matches!(err, LoggingError::File { .. }));
    }
}
