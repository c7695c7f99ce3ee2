//! Error types for the long-term memory crate.

use mneme_rs_protocol::InterchangeError;
use mneme_rs_storage::StorageError;
use thiserror::Error;

/// Errors returned by long-term memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Nothing archived under the requested id.
    #[error("not archived: {0}")]
    NotFound(String),
    /// Storage is unreachable; callers may retry with backoff.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// App or user missing or malformed.
    #[error("invalid tenancy: {0}")]
    InvalidTenancy(String),
    /// A search result fell outside the caller's tenancy prefix.
    #[error("isolation violation: key {key} outside {prefix}")]
    IsolationViolation { key: String, prefix: String },
    /// Stored transcript could not be decoded.
    #[error("interchange error: {0}")]
    Interchange(#[from] InterchangeError),
    /// Other storage failure.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl MemoryError {
    /// Whether the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            MemoryError::BackendUnavailable(_) => true,
            MemoryError::Storage(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<StorageError> for MemoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => MemoryError::NotFound(key),
            StorageError::Unavailable(message) => MemoryError::BackendUnavailable(message),
            StorageError::InvalidTenancy(message) => MemoryError::InvalidTenancy(message),
            other => MemoryError::Storage(other),
        }
    }
}
