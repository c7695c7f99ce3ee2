//! In-process adapter backed by an ordered map.

use crate::adapter::validate_key;
use crate::{BackendAdapter, BackendKind, Document, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Volatile adapter; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct InProcessBackend {
    entries: RwLock<BTreeMap<String, Document>>,
}

impl InProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl BackendAdapter for InProcessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InProcess
    }

    async fn create(&self, key: &str, initial: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        match self.entries.write().entry(key.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(initial);
                Ok(())
            }
        }
    }

    async fn read(&self, key: &str) -> Result<Document, StorageError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, value: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
