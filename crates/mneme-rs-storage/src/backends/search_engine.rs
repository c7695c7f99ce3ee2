//! Vector-capable search engine adapter.

use crate::adapter::validate_key;
use crate::document::{
    SearchHit, SearchQuery, cosine_similarity, rank_hits, text_match_score,
};
use crate::{BackendAdapter, BackendKind, Document, StorageError};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Adapter ranking documents by embedding similarity.
///
/// Documents without an embedding, or queries without one, are scored by
/// text match. With a snapshot path the whole index is persisted as JSON
/// after every mutation, under the index write lock, so each write costs
/// time proportional to the index size. A mutation whose snapshot fails is
/// rolled back before the error is returned.
#[derive(Debug, Default)]
pub struct SearchEngineBackend {
    index: RwLock<BTreeMap<String, Document>>,
    snapshot: Option<PathBuf>,
}

impl SearchEngineBackend {
    /// Volatile index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index persisted to a snapshot file, loading it if present.
    pub fn open(snapshot: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let snapshot = snapshot.into();
        let index = if snapshot.exists() {
            let data = fs::read(&snapshot)?;
            serde_json::from_slice(&data)?
        } else {
            BTreeMap::new()
        };
        debug!(
            "opened search engine index (path={}, documents={})",
            snapshot.display(),
            index.len()
        );
        Ok(Self {
            index: RwLock::new(index),
            snapshot: Some(snapshot),
        })
    }

    fn persist(&self, index: &BTreeMap<String, Document>) -> Result<(), StorageError> {
        let Some(path) = self.snapshot.as_deref() else {
            return Ok(());
        };
        write_snapshot(path, index)
    }

    fn score(document: &Document, query: &SearchQuery) -> f32 {
        if let (Some(query_embedding), Some(embedding)) =
            (query.embedding.as_deref(), document.embedding.as_deref())
        {
            if query_embedding.len() == embedding.len() {
                return cosine_similarity(query_embedding, embedding);
            }
        }
        document
            .text
            .as_deref()
            .map(|text| text_match_score(text, &query.text))
            .unwrap_or(0.0)
    }
}

fn write_snapshot(path: &Path, index: &BTreeMap<String, Document>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let data = serde_json::to_vec(index)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[async_trait]
impl BackendAdapter for SearchEngineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SearchEngine
    }

    fn supports_vectors(&self) -> bool {
        true
    }

    async fn create(&self, key: &str, initial: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut index = self.index.write();
        if index.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        index.insert(key.to_string(), initial);
        if let Err(err) = self.persist(&index) {
            index.remove(key);
            return Err(err);
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Document, StorageError> {
        self.index
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, value: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut index = self.index.write();
        let previous = index.insert(key.to_string(), value);
        if let Err(err) = self.persist(&index) {
            match previous {
                Some(previous) => index.insert(key.to_string(), previous),
                None => index.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut index = self.index.write();
        let Some(removed) = index.remove(key) else {
            return Ok(false);
        };
        if let Err(err) = self.persist(&index) {
            index.insert(key.to_string(), removed);
            return Err(err);
        }
        Ok(true)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let index = self.index.read();
        Ok(index
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn search(
        &self,
        prefix: &str,
        query: &SearchQuery,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let index = self.index.read();
        let hits = index
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, document)| {
                let score = Self::score(document, query);
                (score > 0.0).then(|| SearchHit {
                    key: key.clone(),
                    document: document.clone(),
                    score,
                })
            })
            .collect();
        Ok(rank_hits(hits, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::SearchEngineBackend;
    use crate::{BackendAdapter, Document, SearchQuery, StorageError};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn ranks_by_cosine_similarity() {
        let backend = SearchEngineBackend::new();
        backend
            .write(
                "t/near",
                Document::new(json!(1)).with_embedding(vec![1.0, 0.1]),
            )
            .await
            .expect("write");
        backend
            .write(
                "t/far",
                Document::new(json!(2)).with_embedding(vec![0.2, 1.0]),
            )
            .await
            .expect("write");
        let hits = backend
            .search("t/", &SearchQuery::text("q").with_embedding(vec![1.0, 0.0]), 5)
            .await
            .expect("search");
        let keys = hits.iter().map(|hit| hit.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["t/near", "t/far"]);
    }

    #[tokio::test]
    async fn falls_back_to_text_without_embeddings() {
        let backend = SearchEngineBackend::new();
        backend
            .write("t/a", Document::new(json!(1)).with_text("project alpha kickoff"))
            .await
            .expect("write");
        let hits = backend
            .search("t/", &SearchQuery::text("Project Alpha"), 5)
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 1.0);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("index.json");
        {
            let backend = SearchEngineBackend::open(&path).expect("open");
            backend
                .create("t/a", Document::new(json!({ "x": 1 })))
                .await
                .expect("create");
        }
        let backend = SearchEngineBackend::open(&path).expect("reopen");
        assert_eq!(backend.list("t/").await.expect("list"), vec!["t/a"]);
    }

    #[tokio::test]
    async fn failed_snapshot_leaves_index_unchanged() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path().join("index");
        let backend = SearchEngineBackend::open(dir.join("index.json")).expect("open");
        backend
            .create("t/kept", Document::new(json!("v1")))
            .await
            .expect("create");

        std::fs::remove_dir_all(&dir).expect("remove dir");
        std::fs::write(&dir, b"not a directory").expect("block dir");

        let err = backend
            .create("t/new", Document::new(json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(matches!(
            backend.read("t/new").await,
            Err(StorageError::NotFound(_))
        ));
        let retry = backend.create("t/new", Document::new(json!(1))).await;
        assert!(matches!(retry, Err(StorageError::Io(_))));

        assert!(
            backend
                .write("t/kept", Document::new(json!("v2")))
                .await
                .is_err()
        );
        assert_eq!(backend.read("t/kept").await.expect("read").body, json!("v1"));
        assert!(backend.delete("t/kept").await.is_err());
        assert_eq!(backend.list("t/").await.expect("list"), vec!["t/kept"]);
    }
}
