//! Sliding-window compaction of conversation logs.

use crate::{ConversationStore, MnemeCoreError, Summarizer};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use mneme_rs_config::{CompactionConfig, CompactionTrigger};
use mneme_rs_protocol::{Author, CompactedSpan, Conversation, Event, EventId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// When a conversation is due for compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionPolicy {
    pub enabled: bool,
    pub interval: usize,
    pub overlap: usize,
    pub trigger: CompactionTrigger,
    pub time_threshold: Option<Duration>,
}

impl CompactionPolicy {
    /// Count-triggered policy. `overlap` must be smaller than `interval`.
    pub fn new(interval: usize, overlap: usize) -> Result<Self, MnemeCoreError> {
        let policy = Self {
            enabled: true,
            interval,
            overlap,
            trigger: CompactionTrigger::Count,
            time_threshold: None,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_config(config: &CompactionConfig) -> Result<Self, MnemeCoreError> {
        let policy = Self {
            enabled: config.enabled,
            interval: config.interval,
            overlap: config.overlap,
            trigger: config.trigger,
            time_threshold: config
                .time_threshold_secs
                .map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Reject windows that could never be compacted.
    ///
    /// With `overlap >= interval` the head to summarize is always empty and
    /// the log would grow without bound.
    pub fn validate(&self) -> Result<(), MnemeCoreError> {
        if self.interval == 0 {
            return Err(MnemeCoreError::InvalidPolicy(
                "interval must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.interval {
            return Err(MnemeCoreError::InvalidPolicy(format!(
                "overlap ({}) must be smaller than interval ({})",
                self.overlap, self.interval
            )));
        }
        if self.trigger.uses_time() && self.time_threshold.is_none() {
            return Err(MnemeCoreError::InvalidPolicy(format!(
                "trigger {:?} needs a time threshold",
                self.trigger
            )));
        }
        Ok(())
    }

    /// Evaluate the trigger against a conversation snapshot.
    pub fn is_due(&self, conversation: &Conversation, now: DateTime<Utc>) -> bool {
        if !self.enabled || self.interval == 0 {
            return false;
        }
        let count_due = conversation.window_invocations() >= self.interval;
        let time_due = self.time_due(conversation, now);
        match self.trigger {
            CompactionTrigger::Count => count_due,
            CompactionTrigger::Time => time_due,
            CompactionTrigger::Any => count_due || time_due,
            CompactionTrigger::All => count_due && time_due,
        }
    }

    fn time_due(&self, conversation: &Conversation, now: DateTime<Utc>) -> bool {
        let Some(threshold) = self.time_threshold else {
            return false;
        };
        if conversation.window_invocations() == 0 {
            return false;
        }
        let since = conversation
            .last_compacted_at()
            .unwrap_or(conversation.created_at);
        now - since >= threshold
    }
}

/// Per-conversation compaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionPhase {
    Idle,
    Compacting,
}

/// Result of a compaction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CompactionOutcome {
    /// Trigger did not fire, or there was nothing to summarize.
    NotDue,
    /// Another compaction of the same conversation is running.
    InProgress,
    /// The head was replaced by a summary.
    Compacted {
        summary_id: EventId,
        replaced: usize,
        remaining: usize,
    },
    /// Summarizer failed; the conversation is left as is.
    Failed { reason: String },
    /// The log changed under the summarizer; the conversation is left as is.
    Conflict,
}

impl CompactionOutcome {
    pub fn is_compacted(&self) -> bool {
        matches!(self, CompactionOutcome::Compacted { .. })
    }
}

/// Summarizes the head of a conversation once its trigger fires.
///
/// The summarizer call runs without holding the conversation lock; the
/// replace step re-checks the summarized head, so events appended meanwhile
/// are kept after the summary.
pub struct CompactionEngine {
    store: Arc<ConversationStore>,
    summarizer: Arc<dyn Summarizer>,
    policy: CompactionPolicy,
    in_flight: Mutex<HashSet<String>>,
}

impl CompactionEngine {
    pub fn new(
        store: Arc<ConversationStore>,
        summarizer: Arc<dyn Summarizer>,
        policy: CompactionPolicy,
    ) -> Result<Self, MnemeCoreError> {
        policy.validate()?;
        Ok(Self {
            store,
            summarizer,
            policy,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    /// Current phase of a conversation.
    pub fn phase(&self, app: &str, user: &str, id: &str) -> CompactionPhase {
        if self.in_flight.lock().contains(&flight_key(app, user, id)) {
            CompactionPhase::Compacting
        } else {
            CompactionPhase::Idle
        }
    }

    /// Compact the conversation if its trigger has fired.
    pub async fn maybe_compact(
        &self,
        conversation: &Conversation,
    ) -> Result<CompactionOutcome, MnemeCoreError> {
        if !self.policy.is_due(conversation, Utc::now()) {
            return Ok(CompactionOutcome::NotDue);
        }
        self.run(conversation).await
    }

    /// Compact the conversation now, regardless of the trigger.
    pub async fn compact(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<CompactionOutcome, MnemeCoreError> {
        let conversation = self.store.get_conversation(app, user, id).await?;
        self.run(&conversation).await
    }

    async fn run(&self, conversation: &Conversation) -> Result<CompactionOutcome, MnemeCoreError> {
        let Some(_flight) = InFlight::enter(
            &self.in_flight,
            flight_key(&conversation.app, &conversation.user, &conversation.id),
        ) else {
            debug!(
                "compaction already running (conversation={})",
                conversation.id
            );
            return Ok(CompactionOutcome::InProgress);
        };

        let Some(head) = split_head(&conversation.events, self.policy.overlap) else {
            return Ok(CompactionOutcome::NotDue);
        };

        let summary = match self.summarizer.summarize(head).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(
                    "compaction failed, conversation left uncompacted (conversation={}, error={err})",
                    conversation.id
                );
                return Ok(CompactionOutcome::Failed {
                    reason: err.to_string(),
                });
            }
        };
        let summary = seal_summary(summary, head);
        let summary_id = summary.id;
        let head_ids = head.iter().map(|event| event.id).collect::<Vec<_>>();

        match self
            .store
            .replace_window(
                &conversation.app,
                &conversation.user,
                &conversation.id,
                &head_ids,
                summary,
            )
            .await
        {
            Ok(updated) => {
                info!(
                    "conversation compacted (conversation={}, replaced={}, remaining={})",
                    conversation.id,
                    head_ids.len(),
                    updated.events.len()
                );
                Ok(CompactionOutcome::Compacted {
                    summary_id,
                    replaced: head_ids.len(),
                    remaining: updated.events.len(),
                })
            }
            Err(MnemeCoreError::WindowConflict(message)) => {
                warn!(
                    "compaction skipped (conversation={}, reason={message})",
                    conversation.id
                );
                Ok(CompactionOutcome::Conflict)
            }
            Err(err) => Err(err),
        }
    }
}

/// Events to summarize: everything but the trailing `overlap`.
///
/// None when the head is empty or holds nothing but an earlier summary.
fn split_head(events: &[Event], overlap: usize) -> Option<&[Event]> {
    let cut = events.len().checked_sub(overlap)?;
    let head = &events[..cut];
    head.iter().any(|event| !event.is_summary()).then_some(head)
}

/// Force the summary's author and attach the span it replaces.
fn seal_summary(mut summary: Event, head: &[Event]) -> Event {
    summary.author = Author::System;
    summary.is_partial = false;
    summary.timestamp = Utc::now();
    if let (Some(first), Some(last)) = (head.first(), head.last()) {
        summary.compacted = Some(CompactedSpan {
            first_event_id: first.id,
            last_event_id: last.id,
            event_count: head.len(),
            first_timestamp: first.timestamp,
            last_timestamp: last.timestamp,
        });
    }
    summary
}

fn flight_key(app: &str, user: &str, id: &str) -> String {
    format!("{app}\u{1f}{user}\u{1f}{id}")
}

/// Marks a conversation as compacting until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlight<'a> {
    fn enter(set: &'a Mutex<HashSet<String>>, key: String) -> Option<Self> {
        if !set.lock().insert(key.clone()) {
            return None;
        }
        Some(Self { set, key })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}
