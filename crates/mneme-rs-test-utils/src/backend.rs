//! Fault-injecting backend wrapper.

use async_trait::async_trait;
use mneme_rs_storage::{
    BackendAdapter, BackendKind, Document, SearchHit, SearchQuery, StorageError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Delegates to an inner adapter until switched offline or told to fail
/// the next N calls, then returns `StorageError::Unavailable`.
pub struct FlakyBackend {
    inner: Arc<dyn BackendAdapter>,
    offline: AtomicBool,
    failures_left: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(inner: Arc<dyn BackendAdapter>) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            failures_left: AtomicUsize::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` calls.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("backend offline".to_string()));
        }
        let consumed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if consumed.is_ok() {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendAdapter for FlakyBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn supports_vectors(&self) -> bool {
        self.inner.supports_vectors()
    }

    async fn create(&self, key: &str, initial: Document) -> Result<(), StorageError> {
        self.check()?;
        self.inner.create(key, initial).await
    }

    async fn read(&self, key: &str) -> Result<Document, StorageError> {
        self.check()?;
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: Document) -> Result<(), StorageError> {
        self.check()?;
        self.inner.write(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.check()?;
        self.inner.list(prefix).await
    }

    async fn search(
        &self,
        prefix: &str,
        query: &SearchQuery,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        self.check()?;
        self.inner.search(prefix, query, top_k).await
    }
}
