//! Session/event JSON interchange format used by evaluation tooling and the
//! long-term archive transcript.

use crate::conversation::Conversation;
use crate::event::{Author, CompactedSpan, Event, Part, ToolUse};
use crate::{ConversationId, EventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned when decoding interchange documents.
#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Event as it appears in the interchange document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventJson {
    pub id: EventId,
    pub author: Author,
    #[serde(default)]
    pub parts: Vec<Part>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_partial: bool,
    /// Derived from tool-invocation parts; ignored on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_uses: Option<Vec<ToolUse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compacted: Option<CompactedSpan>,
}

/// Conversation as it appears in the interchange document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionJson {
    pub id: ConversationId,
    pub app_name: String,
    pub user_id: String,
    #[serde(default)]
    pub state: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<EventJson>,
}

impl From<&Event> for EventJson {
    fn from(event: &Event) -> Self {
        let tool_uses = event.tool_uses();
        Self {
            id: event.id,
            author: event.author,
            parts: event.parts.clone(),
            timestamp: event.timestamp,
            is_partial: event.is_partial,
            tool_uses: if tool_uses.is_empty() {
                None
            } else {
                Some(tool_uses)
            },
            compacted: event.compacted.clone(),
        }
    }
}

impl From<EventJson> for Event {
    fn from(value: EventJson) -> Self {
        Self {
            id: value.id,
            author: value.author,
            parts: value.parts,
            is_partial: value.is_partial,
            timestamp: value.timestamp,
            compacted: value.compacted,
        }
    }
}

impl From<&Conversation> for SessionJson {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            app_name: conversation.app.clone(),
            user_id: conversation.user.clone(),
            state: conversation.state.clone(),
            created_at: conversation.created_at,
            last_updated_at: conversation.last_updated_at,
            events: conversation.events.iter().map(EventJson::from).collect(),
        }
    }
}

impl From<SessionJson> for Conversation {
    fn from(value: SessionJson) -> Self {
        Self {
            app: value.app_name,
            user: value.user_id,
            id: value.id,
            events: value.events.into_iter().map(Event::from).collect(),
            state: value.state,
            created_at: value.created_at,
            last_updated_at: value.last_updated_at,
        }
    }
}

impl SessionJson {
    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Result<Value, InterchangeError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, InterchangeError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as pretty JSON text.
    pub fn to_json_string(&self) -> Result<String, InterchangeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON text.
    pub fn from_json_str(contents: &str) -> Result<Self, InterchangeError> {
        Ok(serde_json::from_str(contents)?)
    }
}
