//! Conversation events and their content parts.

use crate::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Origin of an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// End-user input.
    User,
    /// Model output.
    Agent,
    /// Tool interaction.
    Tool,
    /// Synthetic events such as compaction summaries.
    System,
}

impl Author {
    /// Stable lowercase label used in transcripts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Author::User => "user",
            Author::Agent => "agent",
            Author::Tool => "tool",
            Author::System => "system",
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed piece of event content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Part {
    /// Plain text.
    Text { text: String },
    /// A function call requested by the agent.
    ToolInvocation {
        id: String,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    /// The output of a previously requested call.
    ToolResult {
        id: String,
        name: String,
        #[serde(default)]
        output: Value,
    },
}

impl Part {
    /// Build a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Return the text payload when this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Reference to the span of events a summary replaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactedSpan {
    /// First replaced event.
    pub first_event_id: EventId,
    /// Last replaced event.
    pub last_event_id: EventId,
    /// Number of events replaced, including any earlier summary.
    pub event_count: usize,
    /// Timestamp of the first replaced event.
    pub first_timestamp: DateTime<Utc>,
    /// Timestamp of the last replaced event.
    pub last_timestamp: DateTime<Utc>,
}

/// A tool call surfaced in the interchange format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One immutable turn-unit within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Who produced the event.
    pub author: Author,
    /// Ordered content parts.
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Streaming fragment that is not yet a complete turn.
    #[serde(default)]
    pub is_partial: bool,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Present only on compaction summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compacted: Option<CompactedSpan>,
}

impl Event {
    /// Create a complete event with the given parts.
    pub fn new(author: Author, parts: Vec<Part>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            parts,
            is_partial: false,
            timestamp: Utc::now(),
            compacted: None,
        }
    }

    /// Create a single-part text event.
    pub fn text(author: Author, text: impl Into<String>) -> Self {
        Self::new(author, vec![Part::text(text)])
    }

    /// Mark the event as a streaming fragment.
    pub fn partial(mut self) -> Self {
        self.is_partial = true;
        self
    }

    /// True for synthetic compaction summaries.
    pub fn is_summary(&self) -> bool {
        self.compacted.is_some()
    }

    /// Concatenate all text parts, separated by newlines.
    pub fn text_content(&self) -> String {
        let texts = self
            .parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>();
        texts.join("\n")
    }

    /// Tool invocations carried by this event.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolInvocation {
                    id,
                    name,
                    arguments,
                } => Some(ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Author, Event, Part};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn text_content_skips_tool_parts() {
        let event = Event::new(
            Author::Agent,
            vec![
                Part::text("looking it up"),
                Part::ToolInvocation {
                    id: "call_1".to_string(),
                    name: "search".to_string(),
                    arguments: json!({ "q": "weather" }),
                },
                Part::text("done"),
            ],
        );
        assert_eq!(event.text_content(), "looking it up\ndone");
        assert_eq!(event.tool_uses().len(), 1);
        assert_eq!(event.tool_uses()[0].name, "search");
    }

    #[test]
    fn parts_serialize_with_type_tag() {
        let part = Part::ToolResult {
            id: "call_1".to_string(),
            name: "search".to_string(),
            output: json!("sunny"),
        };
        let value = serde_json::to_value(&part).expect("serialize");
        assert_eq!(
            value,
            json!({ "type": "tool_result", "id": "call_1", "name": "search", "output": "sunny" })
        );
        assert_eq!(serde_json::to_value(Author::Agent).expect("author"), json!("agent"));
    }
}
