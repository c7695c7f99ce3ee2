//! Error types for the short-term memory crate.

use mneme_rs_storage::StorageError;
use thiserror::Error;

/// Errors returned by conversation store and short-term memory operations.
#[derive(Debug, Error)]
pub enum MnemeCoreError {
    /// Conversation does not exist.
    #[error("conversation not found: {0}")]
    NotFound(String),
    /// Conversation id already taken for this app and user.
    #[error("conversation already exists: {0}")]
    AlreadyExists(String),
    /// Storage is unreachable; callers may retry with backoff.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// App, user or conversation id missing or malformed.
    #[error("invalid tenancy: {0}")]
    InvalidTenancy(String),
    /// The compacted head changed between summarizing and replacing it.
    #[error("compaction window changed: {0}")]
    WindowConflict(String),
    /// Compaction window settings that can never compact.
    #[error("invalid compaction policy: {0}")]
    InvalidPolicy(String),
    /// Other storage failure.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl MnemeCoreError {
    /// Whether the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            MnemeCoreError::BackendUnavailable(_) => true,
            MnemeCoreError::Storage(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<StorageError> for MnemeCoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => MnemeCoreError::NotFound(key),
            StorageError::AlreadyExists(key) => MnemeCoreError::AlreadyExists(key),
            StorageError::Unavailable(message) => MnemeCoreError::BackendUnavailable(message),
            StorageError::InvalidTenancy(message) => MnemeCoreError::InvalidTenancy(message),
            other => MnemeCoreError::Storage(other),
        }
    }
}
