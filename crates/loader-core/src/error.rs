//! Loader error types.

use thiserror::Error;

/// Errors raised while building or validating loader configuration.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// TOML config could not be parsed.
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON config could not be parsed.
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Asset origin is not an absolute http(s) URL.
    #[error("Invalid asset origin: {0}")]
    InvalidAssetOrigin(String),

    /// Policy preset name is not in the table.
    #[error("Unknown policy preset: {0}")]
    UnknownPreset(String),

    /// A timing value is zero or inconsistent.
    #[error("Invalid timing for {field}: {reason}")]
    InvalidTiming { field: &'static str, reason: String },

    /// Any other configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for loader-core operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
