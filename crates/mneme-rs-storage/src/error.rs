//! Error types for storage adapters.

use std::io::ErrorKind;
use thiserror::Error;

/// Errors returned by backend adapters and the tenancy resolver.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No value stored under the key.
    #[error("key not found: {0}")]
    NotFound(String),
    /// A value is already stored under the key.
    #[error("key already exists: {0}")]
    AlreadyExists(String),
    /// The backend could not be reached; callers may retry with backoff.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Key rejected by the adapter.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Tenancy fields missing or malformed.
    #[error("invalid tenancy: {0}")]
    InvalidTenancy(String),
    /// Backend configuration is incomplete.
    #[error("invalid backend config: {0}")]
    Config(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Whether the failure is a transient connectivity problem.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Unavailable(_) => true,
            StorageError::Io(err) => matches!(
                err.kind(),
                ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
            ),
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StorageError;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(StorageError::Unavailable("down".to_string()).is_retryable());
        assert!(
            StorageError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)).is_retryable()
        );
        assert!(!StorageError::NotFound("k".to_string()).is_retryable());
        assert!(
            !StorageError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                .is_retryable()
        );
    }
}
