//! Backend adapter contract shared by all storage technologies.

use crate::document::{Document, SearchHit, SearchQuery, rank_hits, text_match_score};
use crate::{BackendKind, StorageError};
use async_trait::async_trait;

#[async_trait]
/// Uniform key/value interface over a persistence technology.
///
/// A single `write` is atomic; there are no cross-key transactions. Callers
/// that read-modify-write a key serialize themselves per key.
pub trait BackendAdapter: Send + Sync {
    /// Technology behind this adapter.
    fn kind(&self) -> BackendKind;

    /// Whether `search` ranks by embedding similarity.
    fn supports_vectors(&self) -> bool {
        false
    }

    /// Store `initial` under a new key; fails with `AlreadyExists`.
    async fn create(&self, key: &str, initial: Document) -> Result<(), StorageError>;

    /// Read the value under a key; fails with `NotFound`.
    async fn read(&self, key: &str) -> Result<Document, StorageError>;

    /// Overwrite (or insert) the value under a key.
    async fn write(&self, key: &str, value: Document) -> Result<(), StorageError>;

    /// Remove a key, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Keys starting with `prefix`, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Rank documents under `prefix` against a query.
    ///
    /// The default scans the prefix and scores document text by substring
    /// match; only keys under `prefix` are ever considered.
    async fn search(
        &self,
        prefix: &str,
        query: &SearchQuery,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let mut hits = Vec::new();
        for key in self.list(prefix).await? {
            let document = match self.read(&key).await {
                Ok(document) => document,
                Err(StorageError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            let Some(text) = document.text.as_deref() else {
                continue;
            };
            let score = text_match_score(text, &query.text);
            if score > 0.0 {
                hits.push(SearchHit {
                    key,
                    document,
                    score,
                });
            }
        }
        Ok(rank_hits(hits, top_k))
    }
}

/// Reject keys no adapter can store safely.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if key.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(format!(
            "control characters in key: {key:?}"
        )));
    }
    Ok(())
}
