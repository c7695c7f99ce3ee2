//! SQLite-backed relational adapter.

use crate::adapter::validate_key;
use crate::document::{SearchHit, SearchQuery, rank_hits, text_match_score};
use crate::{BackendAdapter, BackendKind, Document, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS documents (
    key TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL,
    text TEXT,
    embedding TEXT,
    updated_at TEXT NOT NULL
);
"#;

/// Rows matching a key prefix; the prefix comparison runs inside SQLite.
const PREFIX_FILTER: &str = "substr(key, 1, length(?1)) = ?1";

/// Adapter storing each document as one row of a `documents` table.
pub struct RelationalBackend {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl RelationalBackend {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        debug!("opened relational backend (path={})", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Database file, when not in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            op(&conn)
        })
        .await
        .map_err(|err| StorageError::Unavailable(format!("sqlite task failed: {err}")))?
    }
}

struct Row {
    key: String,
    body: String,
    text: Option<String>,
    embedding: Option<String>,
}

fn encode_row(value: &Document) -> Result<(String, Option<String>), StorageError> {
    let body = serde_json::to_string(&value.body)?;
    let embedding = value
        .embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    Ok((body, embedding))
}

fn decode_row(row: Row) -> Result<(String, Document), StorageError> {
    let body = serde_json::from_str(&row.body)?;
    let embedding = row
        .embedding
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    Ok((
        row.key,
        Document {
            body,
            text: row.text,
            embedding,
        },
    ))
}

#[async_trait]
impl BackendAdapter for RelationalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn create(&self, key: &str, initial: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        let key = key.to_string();
        let (body, embedding) = encode_row(&initial)?;
        let text = initial.text;
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO documents (key, body, text, embedding, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key, body, text, embedding, Utc::now().to_rfc3339()],
            )?;
            if inserted == 0 {
                return Err(StorageError::AlreadyExists(key));
            }
            Ok(())
        })
        .await
    }

    async fn read(&self, key: &str) -> Result<Document, StorageError> {
        let key = key.to_string();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT key, body, text, embedding FROM documents WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok(Row {
                            key: row.get(0)?,
                            body: row.get(1)?,
                            text: row.get(2)?,
                            embedding: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            match row {
                Some(row) => Ok(decode_row(row)?.1),
                None => Err(StorageError::NotFound(key)),
            }
        })
        .await
    }

    async fn write(&self, key: &str, value: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        let key = key.to_string();
        let (body, embedding) = encode_row(&value)?;
        let text = value.text;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO documents (key, body, text, embedding, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                    body = excluded.body,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at",
                params![key, body, text, embedding, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let key = key.to_string();
        self.run(move |conn| {
            let removed = conn.execute("DELETE FROM documents WHERE key = ?1", params![key])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = prefix.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT key FROM documents WHERE {PREFIX_FILTER} ORDER BY key"
            ))?;
            let keys = stmt
                .query_map(params![prefix], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }

    async fn search(
        &self,
        prefix: &str,
        query: &SearchQuery,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, StorageError> {
        let prefix = prefix.to_string();
        let query_text = query.text.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT key, body, text, embedding FROM documents
                 WHERE {PREFIX_FILTER} AND text IS NOT NULL
                 ORDER BY key"
            ))?;
            let rows = stmt
                .query_map(params![prefix], |row| {
                    Ok(Row {
                        key: row.get(0)?,
                        body: row.get(1)?,
                        text: row.get(2)?,
                        embedding: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let mut hits = Vec::new();
            for row in rows {
                let (key, document) = decode_row(row)?;
                let score = document
                    .text
                    .as_deref()
                    .map(|text| text_match_score(text, &query_text))
                    .unwrap_or(0.0);
                if score > 0.0 {
                    hits.push(SearchHit {
                        key,
                        document,
                        score,
                    });
                }
            }
            Ok(rank_hits(hits, top_k))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::RelationalBackend;
    use crate::{BackendAdapter, Document};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("mneme.db");
        {
            let backend = RelationalBackend::open(&path).expect("open");
            backend
                .create("a/1", Document::new(json!({ "v": 1 })).with_embedding(vec![0.5, 1.0]))
                .await
                .expect("create");
        }
        let backend = RelationalBackend::open(&path).expect("reopen");
        let document = backend.read("a/1").await.expect("read");
        assert_eq!(document.body, json!({ "v": 1 }));
        assert_eq!(document.embedding, Some(vec![0.5, 1.0]));
    }

    #[tokio::test]
    async fn prefix_filter_treats_like_wildcards_literally() {
        let backend = RelationalBackend::open_in_memory().expect("open");
        backend
            .write("a_b/1", Document::new(json!(1)))
            .await
            .expect("write");
        backend
            .write("axb/1", Document::new(json!(2)))
            .await
            .expect("write");
        assert_eq!(backend.list("a_b/").await.expect("list"), vec!["a_b/1"]);
    }
}
