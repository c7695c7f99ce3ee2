//! Summarizer collaborator used by compaction.

use async_trait::async_trait;
use mneme_rs_protocol::{Author, Event};
use thiserror::Error;

/// Errors reported by a summarizer.
#[derive(Debug, Error)]
pub enum SummarizerError {
    /// The summarizing service could not be reached.
    #[error("summarizer unavailable: {0}")]
    Unavailable(String),
    /// Nothing worth summarizing in the input.
    #[error("summarizer produced an empty summary")]
    Empty,
    /// Any other failure.
    #[error("summarizer failed: {0}")]
    Failed(String),
}

/// Condenses a span of events into one event.
///
/// The compaction engine overrides the returned event's author and attaches
/// the span reference, so implementations only need to produce content.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, events: &[Event]) -> Result<Event, SummarizerError>;
}

/// Deterministic summarizer that keeps a truncated `author: text` transcript.
#[derive(Debug, Clone)]
pub struct TranscriptSummarizer {
    max_chars: usize,
}

impl TranscriptSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for TranscriptSummarizer {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[async_trait]
impl Summarizer for TranscriptSummarizer {
    async fn summarize(&self, events: &[Event]) -> Result<Event, SummarizerError> {
        if events.is_empty() || self.max_chars == 0 {
            return Err(SummarizerError::Empty);
        }
        let lines = events
            .iter()
            .filter_map(|event| {
                let text = event.text_content();
                if text.trim().is_empty() {
                    None
                } else {
                    Some(format!("{}: {}", event.author, text))
                }
            })
            .collect::<Vec<_>>();
        let summary = truncate_chars(&lines.join("\n"), self.max_chars);
        if summary.trim().is_empty() {
            return Err(SummarizerError::Empty);
        }
        Ok(Event::text(Author::System, summary))
    }
}

/// Truncate a string to `max_chars` characters.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}
