//! Wire and data model types shared by the Mneme memory crates.

mod conversation;
mod event;
mod interchange;
mod record;

pub use conversation::Conversation;
pub use event::{Author, CompactedSpan, Event, Part, ToolUse};
pub use interchange::{EventJson, InterchangeError, SessionJson};
pub use record::{MemoryRecord, ScoredRecord};

use uuid::Uuid;

/// Caller-chosen identifier for a conversation, unique within `(app, user)`.
pub type ConversationId = String;
/// Unique identifier for an event.
pub type EventId = Uuid;
/// Unique identifier for a long-term memory record.
pub type RecordId = Uuid;
