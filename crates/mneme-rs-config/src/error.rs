//! Config errors.

use thiserror::Error;

/// Failure while loading, merging or validating a [`crate::MnemeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON5.
    #[error("config syntax error: {0}")]
    Syntax(#[from] json5::Error),
    /// The merged document does not match the config model.
    #[error("config shape error: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A rule spanning several fields was violated.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Dotted path of the offending field, when the error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidField { path, .. } => Some(path),
            _ => None,
        }
    }
}
