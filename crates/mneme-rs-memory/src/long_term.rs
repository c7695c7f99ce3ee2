//! Long-term memory service: archive, search, delete and restore.

use crate::{Embedder, MemoryError, chunk_text};
use chrono::Utc;
use log::{debug, error, info, warn};
use mneme_rs_config::LongTermConfig;
use mneme_rs_protocol::{
    Author, Conversation, ConversationId, EventId, MemoryRecord, ScoredRecord, SessionJson,
};
use mneme_rs_storage::tenancy::unescape_component;
use mneme_rs_storage::{
    BackendAdapter, Document, SearchQuery, StorageError, Subsystem, Tenancy, TenancyKey, resolve,
};
use std::sync::Arc;
use uuid::Uuid;

const RECORDS: &str = "records";
const TRANSCRIPTS: &str = "transcripts";

/// Archive and retrieval settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTermOptions {
    pub top_k: usize,
    pub chunk_max_chars: usize,
    pub min_score: Option<f32>,
    pub archive_authors: Vec<Author>,
}

impl Default for LongTermOptions {
    fn default() -> Self {
        Self::from_config(&LongTermConfig::default())
    }
}

impl LongTermOptions {
    pub fn from_config(config: &LongTermConfig) -> Self {
        Self {
            top_k: config.top_k,
            chunk_max_chars: config.chunk_max_chars,
            min_score: config.min_score,
            archive_authors: config.archive_authors.clone(),
        }
    }
}

/// What happened to one chunk during archive.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    Stored,
    /// Stored, but the embedder failed; the record is found by text match only.
    StoredWithoutEmbedding { reason: String },
    /// A record for this event and chunk index already exists.
    AlreadyArchived,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    pub event_id: EventId,
    pub chunk_index: usize,
    pub status: ChunkStatus,
}

/// Per-chunk result of archiving one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveReport {
    pub conversation_id: ConversationId,
    pub chunks: Vec<ChunkOutcome>,
}

impl ArchiveReport {
    /// Chunks written by this call.
    pub fn stored(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| !matches!(chunk.status, ChunkStatus::AlreadyArchived))
            .count()
    }

    /// Chunks that were already present.
    pub fn skipped(&self) -> usize {
        self.chunks.len() - self.stored()
    }

    /// Chunks stored without an embedding.
    pub fn embedding_failures(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| matches!(chunk.status, ChunkStatus::StoredWithoutEmbedding { .. }))
            .count()
    }
}

/// Per-user archive of conversation content.
///
/// Records live under `long_term/{app}/{user}/records/`, transcripts under
/// `long_term/{app}/{user}/transcripts/`. Embeddings are computed only when
/// both an embedder is configured and the backend ranks by vectors.
pub struct LongTermMemory {
    backend: Arc<dyn BackendAdapter>,
    embedder: Option<Arc<dyn Embedder>>,
    options: LongTermOptions,
}

impl LongTermMemory {
    pub fn new(
        backend: Arc<dyn BackendAdapter>,
        embedder: Option<Arc<dyn Embedder>>,
        options: LongTermOptions,
    ) -> Self {
        Self {
            backend,
            embedder,
            options,
        }
    }

    pub fn options(&self) -> &LongTermOptions {
        &self.options
    }

    fn vector_embedder(&self) -> Option<&Arc<dyn Embedder>> {
        if self.backend.supports_vectors() {
            self.embedder.as_ref()
        } else {
            None
        }
    }

    /// Archive a conversation's eligible text and store its transcript.
    ///
    /// Chunks already archived are skipped, so archiving a conversation again
    /// only adds what is new. Storage errors abort the call; chunks written
    /// before the failure stay in place.
    pub async fn archive(&self, conversation: &Conversation) -> Result<ArchiveReport, MemoryError> {
        let tenancy = user_key(&conversation.app, &conversation.user)?;
        let embedder = self.vector_embedder();
        let mut chunks = Vec::new();

        for event in &conversation.events {
            if event.is_partial
                || !(event.is_summary() || self.options.archive_authors.contains(&event.author))
            {
                continue;
            }
            for (chunk_index, content) in chunk_text(&event.text_content(), self.options.chunk_max_chars)
                .into_iter()
                .enumerate()
            {
                let key = record_key(&tenancy, &conversation.id, event.id, chunk_index);
                let mut status = ChunkStatus::Stored;
                let embedding = match embedder {
                    Some(embedder) => match embedder.embed(&content).await {
                        Ok(vector) => Some(vector),
                        Err(err) => {
                            warn!(
                                "embedding failed, storing chunk without vector (conversation={}, event_id={}, chunk={chunk_index}, error={err})",
                                conversation.id, event.id
                            );
                            status = ChunkStatus::StoredWithoutEmbedding {
                                reason: err.to_string(),
                            };
                            None
                        }
                    },
                    None => None,
                };
                let record = MemoryRecord {
                    id: Uuid::new_v4(),
                    app: conversation.app.clone(),
                    user: conversation.user.clone(),
                    source_conversation_id: conversation.id.clone(),
                    source_event_id: event.id,
                    chunk_index,
                    role: event.author.as_str().to_string(),
                    content: content.clone(),
                    embedding: embedding.clone(),
                    created_at: Utc::now(),
                };
                let mut document = Document::encode(&record)?.with_text(content);
                if let Some(vector) = embedding {
                    document = document.with_embedding(vector);
                }
                match self.backend.create(&key, document).await {
                    Ok(()) => {}
                    Err(StorageError::AlreadyExists(_)) => status = ChunkStatus::AlreadyArchived,
                    Err(err) => return Err(err.into()),
                }
                chunks.push(ChunkOutcome {
                    event_id: event.id,
                    chunk_index,
                    status,
                });
            }
        }

        let transcript = SessionJson::from(conversation).to_value()?;
        self.backend
            .write(&transcript_key(&tenancy, &conversation.id), Document::new(transcript))
            .await?;

        let report = ArchiveReport {
            conversation_id: conversation.id.clone(),
            chunks,
        };
        info!(
            "conversation archived (app={}, user={}, conversation={}, stored={}, skipped={}, embedding_failures={})",
            conversation.app,
            conversation.user,
            conversation.id,
            report.stored(),
            report.skipped(),
            report.embedding_failures()
        );
        Ok(report)
    }

    /// Ranked records of one app and user matching a query.
    pub async fn search(
        &self,
        app: &str,
        user: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        let tenancy = user_key(app, user)?;
        let prefix = tenancy.child_prefix(RECORDS);
        let mut search = SearchQuery::text(query);
        if let Some(embedder) = self.vector_embedder() {
            match embedder.embed(query).await {
                Ok(vector) => search = search.with_embedding(vector),
                Err(err) => {
                    warn!("query embedding failed, falling back to text match (app={app}, user={user}, error={err})")
                }
            }
        }

        let hits = self.backend.search(&prefix, &search, top_k).await?;
        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            if !hit.key.starts_with(&prefix) {
                return Err(isolation_violation(hit.key, prefix));
            }
            let record: MemoryRecord = hit.document.decode()?;
            if record.app != app || record.user != user {
                return Err(isolation_violation(hit.key, prefix));
            }
            if self
                .options
                .min_score
                .is_some_and(|min_score| hit.score < min_score)
            {
                continue;
            }
            records.push(ScoredRecord {
                record,
                score: hit.score,
            });
        }
        debug!(
            "long-term search finished (app={app}, user={user}, hits={})",
            records.len()
        );
        Ok(records)
    }

    /// Search with the configured `top_k`.
    pub async fn search_default(
        &self,
        app: &str,
        user: &str,
        query: &str,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        self.search(app, user, query, self.options.top_k).await
    }

    /// Remove every record and the transcript of one conversation.
    ///
    /// Returns the number of records removed.
    pub async fn delete_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<usize, MemoryError> {
        let tenancy = user_key(app, user)?;
        let prefix = conversation_records_prefix(&tenancy, id);
        let mut removed = 0usize;
        for key in self.backend.list(&prefix).await? {
            if self.backend.delete(&key).await? {
                removed += 1;
            }
        }
        self.backend
            .delete(&transcript_key(&tenancy, id))
            .await?;
        info!("archived conversation deleted (app={app}, user={user}, conversation={id}, records={removed})");
        Ok(removed)
    }

    /// Rebuild a conversation from its archived transcript.
    pub async fn restore(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Conversation, MemoryError> {
        let tenancy = user_key(app, user)?;
        let document = match self.backend.read(&transcript_key(&tenancy, id)).await {
            Ok(document) => document,
            Err(StorageError::NotFound(_)) => return Err(MemoryError::NotFound(id.to_string())),
            Err(err) => return Err(err.into()),
        };
        Ok(SessionJson::from_value(document.body)?.into())
    }

    /// Ids of conversations with a stored transcript.
    pub async fn list_archived(
        &self,
        app: &str,
        user: &str,
    ) -> Result<Vec<ConversationId>, MemoryError> {
        let tenancy = user_key(app, user)?;
        let prefix = tenancy.child_prefix(TRANSCRIPTS);
        Ok(self
            .backend
            .list(&prefix)
            .await?
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(unescape_component)
            .collect())
    }
}

fn user_key(app: &str, user: &str) -> Result<TenancyKey, MemoryError> {
    Ok(resolve(Subsystem::LongTerm, &Tenancy::user(app, user))?)
}

fn record_key(tenancy: &TenancyKey, conversation: &str, event_id: EventId, chunk: usize) -> String {
    tenancy.key(&[
        RECORDS.to_string(),
        conversation.to_string(),
        format!("{event_id}-{chunk}"),
    ])
}

fn conversation_records_prefix(tenancy: &TenancyKey, conversation: &str) -> String {
    format!("{}/", tenancy.key(&[RECORDS, conversation]))
}

fn transcript_key(tenancy: &TenancyKey, conversation: &str) -> String {
    tenancy.key(&[TRANSCRIPTS, conversation])
}

fn isolation_violation(key: String, prefix: String) -> MemoryError {
    error!("search returned a record outside the tenant prefix (key={key}, prefix={prefix})");
    debug_assert!(
        false,
        "isolation violation: key {key} outside prefix {prefix}"
    );
    MemoryError::IsolationViolation { key, prefix }
}

#[cfg(test)]
mod tests {
    use super::{LongTermMemory, LongTermOptions, record_key, user_key};
    use mneme_rs_protocol::{Author, Conversation, Event, Part};
    use mneme_rs_storage::InProcessBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn conversation() -> Conversation {
        let mut conversation = Conversation::new("app", "u1", "c1");
        conversation
            .events
            .push(Event::text(Author::User, "remember project alpha"));
        conversation.events.push(Event::new(
            Author::Tool,
            vec![Part::ToolResult {
                id: "call-1".to_string(),
                name: "lookup".to_string(),
                output: json!({ "status": "ok" }),
            }],
        ));
        conversation
            .events
            .push(Event::text(Author::Agent, "noted").partial());
        conversation
    }

    #[test]
    fn record_keys_nest_under_conversation() {
        let tenancy = user_key("app", "u1").expect("key");
        let id = uuid::Uuid::nil();
        assert_eq!(
            record_key(&tenancy, "c/1", id, 2),
            format!("long_term/app/u1/records/c%2F1/{id}-2")
        );
    }

    #[tokio::test]
    async fn archive_skips_tool_and_partial_events() {
        let memory = LongTermMemory::new(
            Arc::new(InProcessBackend::new()),
            None,
            LongTermOptions::default(),
        );
        let report = memory.archive(&conversation()).await.expect("archive");
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.stored(), 1);
    }

    #[tokio::test]
    async fn rearchive_is_idempotent() {
        let memory = LongTermMemory::new(
            Arc::new(InProcessBackend::new()),
            None,
            LongTermOptions::default(),
        );
        let conversation = conversation();
        memory.archive(&conversation).await.expect("archive");
        let report = memory.archive(&conversation).await.expect("archive again");
        assert_eq!(report.stored(), 0);
        assert_eq!(report.skipped(), 1);
    }
}
