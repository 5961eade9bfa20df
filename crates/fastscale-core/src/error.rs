//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating the configuration document.
///
/// All of these are fatal at startup: no service loop is started.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config lists no services")]
    NoServices,

    #[error("service #{index}: missing required field {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("service #{index}: {field} must not be negative (got {value})")]
    Negative {
        index: usize,
        field: &'static str,
        value: i64,
    },

    #[error("service #{index}: {field} must be at most {max} (got {value})")]
    OutOfRange {
        index: usize,
        field: &'static str,
        value: i64,
        max: u64,
    },

    #[error("config source error: {0}")]
    Source(String),
}
