//! Summarizer doubles.

use async_trait::async_trait;
use mneme_rs_core::{Summarizer, SummarizerError, TranscriptSummarizer};
use mneme_rs_protocol::{Author, Event};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Summarizer returning the same text every time.
#[derive(Debug, Clone)]
pub struct FixedSummarizer {
    text: String,
}

impl FixedSummarizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, _events: &[Event]) -> Result<Event, SummarizerError> {
        Ok(Event::text(Author::System, self.text.clone()))
    }
}

/// Summarizer that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _events: &[Event]) -> Result<Event, SummarizerError> {
        Err(SummarizerError::Unavailable("summarizer offline".to_string()))
    }
}

/// Transcript summarizer that records every input span.
///
/// With [`RecordingSummarizer::paused`] each call waits until [`release`]
/// is called, so tests can interleave appends with a running compaction.
///
/// [`release`]: RecordingSummarizer::release
#[derive(Default)]
pub struct RecordingSummarizer {
    inner: TranscriptSummarizer,
    calls: Mutex<Vec<Vec<Event>>>,
    gate: Option<Arc<Notify>>,
    started: Arc<Notify>,
}

impl RecordingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block each call until released.
    pub fn paused() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::default()
        }
    }

    /// Spans passed to `summarize`, in call order.
    pub fn calls(&self) -> Vec<Vec<Event>> {
        self.calls.lock().clone()
    }

    /// Wait until a call has started.
    pub async fn wait_started(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.started.notified())
            .await
            .unwrap_or_default();
    }

    /// Let a paused call finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, events: &[Event]) -> Result<Event, SummarizerError> {
        self.calls.lock().push(events.to_vec());
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.inner.summarize(events).await
    }
}
