//! Long-term memory records.

use crate::{ConversationId, EventId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable chunk of archived conversation content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Record identifier.
    pub id: RecordId,
    /// Application name.
    pub app: String,
    /// User identifier.
    pub user: String,
    /// Conversation the chunk was archived from.
    pub source_conversation_id: ConversationId,
    /// Event the chunk was cut from.
    pub source_event_id: EventId,
    /// Position of the chunk within its source event.
    pub chunk_index: usize,
    /// Role of the source event.
    pub role: String,
    /// Chunk text.
    pub content: String,
    /// Embedding, present only on vector-capable backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A record returned by search together with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f32,
}
