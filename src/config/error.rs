//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `ANCHOR_MODE` is neither `online` nor `offline_replay`.
    #[error("invalid mode '{value}': expected 'online' or 'offline_replay'")]
    InvalidMode { value: String },

    /// `ANCHOR_SEED` could not be parsed as an unsigned 64-bit integer.
    #[error("failed to parse seed '{value}': {source}")]
    InvalidSeed {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// `ANCHOR_FIXED_TIME` is not an RFC 3339 timestamp.
    #[error("failed to parse fixed time '{value}': {source}")]
    InvalidFixedTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A numeric or boolean variable could not be parsed.
    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("alpha must be within [0, 1], got {value}")]
    InvalidAlpha { value: f64 },

    /// A count or duration that must be positive was zero.
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("invalid normalization '{value}': expected 'min_max' or 'rank'")]
    InvalidNormalization { value: String },

    /// A required environment variable was not set.
    ///
    /// Offline replay requires `ANCHOR_SEED` and `ANCHOR_FIXED_TIME`; the validation
    /// binary requires `ANCHOR_CORPUS_PATH` and `ANCHOR_REQUEST_PATH`.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar { name: &'static str },

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
