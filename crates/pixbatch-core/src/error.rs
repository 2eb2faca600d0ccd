//! Error types for the Pixbatch batch engine.
//!
//! Errors are split by blast radius: [`PixbatchError`] aborts a whole run
//! before any work is submitted, while [`PipelineError`] describes a single
//! item's failure and is always captured into a
//! [`ResultRecord`](crate::types::ResultRecord) instead of propagating.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ErrorKind;

/// Top-level error type for Pixbatch operations.
#[derive(Error, Debug)]
pub enum PixbatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Root input or output directory cannot be read or written
    #[error("Access error for {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PixbatchError {
    pub(crate) fn access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Access {
            path: path.into(),
            source,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-item processing errors, organized by stage.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// Source could not be read or destination could not be written
    #[error("Access error for {path}: {message}")]
    Access { path: PathBuf, message: String },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// A transform stage rejected its input
    #[error("Transform error in {stage} stage for {path}: {message}")]
    Transform {
        path: PathBuf,
        stage: String,
        message: String,
    },

    /// Encoding the transformed image failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },
}

impl PipelineError {
    /// The histogram bucket this error is counted under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Access { .. } => ErrorKind::AccessError,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Transform { .. } | Self::Encode { .. } => ErrorKind::TransformError,
        }
    }

    /// Name of the stage that produced the error, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Transform { stage, .. } => Some(stage),
            Self::Encode { .. } => Some("encode"),
            Self::Decode { .. } => Some("decode"),
            Self::Access { .. } => None,
        }
    }

    /// The bare message without the path prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Access { message, .. }
            | Self::Decode { message, .. }
            | Self::Transform { message, .. }
            | Self::Encode { message, .. } => message,
        }
    }
}

/// Convenience type alias for Pixbatch results.
pub type Result<T> = std::result::Result<T, PixbatchError>;

/// Convenience type alias for per-item pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
