//! Conversation aggregate.

use crate::ConversationId;
use crate::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Short-term event log for one `(app, user, conversation)` tuple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    /// Application name.
    pub app: String,
    /// User identifier.
    pub user: String,
    /// Conversation identifier.
    pub id: ConversationId,
    /// Events in arrival order.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Free-form conversation state.
    #[serde(default)]
    pub state: Map<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub last_updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation stamped with the current time.
    pub fn new(
        app: impl Into<String>,
        user: impl Into<String>,
        id: impl Into<ConversationId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            app: app.into(),
            user: user.into(),
            id: id.into(),
            events: Vec::new(),
            state: Map::new(),
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Number of non-summary events currently in the log.
    pub fn window_invocations(&self) -> usize {
        self.events.iter().filter(|event| !event.is_summary()).count()
    }

    /// Timestamp of the most recent compaction summary, if any.
    pub fn last_compacted_at(&self) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .rev()
            .find(|event| event.is_summary())
            .map(|event| event.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::Conversation;
    use crate::{Author, CompactedSpan, Event};
    use pretty_assertions::assert_eq;

    #[test]
    fn window_invocations_ignore_summaries() {
        let mut conversation = Conversation::new("app", "user", "c1");
        let first = Event::text(Author::User, "one");
        let mut summary = Event::text(Author::System, "summary");
        summary.compacted = Some(CompactedSpan {
            first_event_id: first.id,
            last_event_id: first.id,
            event_count: 1,
            first_timestamp: first.timestamp,
            last_timestamp: first.timestamp,
        });
        conversation.events.push(summary.clone());
        conversation.events.push(Event::text(Author::Agent, "two"));

        assert_eq!(conversation.window_invocations(), 1);
        assert_eq!(conversation.last_compacted_at(), Some(summary.timestamp));
    }
}
