//! Automatic archival of active conversations.

use crate::{ArchiveReport, LongTermMemory};
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use mneme_rs_config::AutoArchiveConfig;
use mneme_rs_core::ConversationStore;
use mneme_rs_protocol::{Conversation, ConversationId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Save bookkeeping for the conversation a user is currently active in.
#[derive(Debug, Clone)]
struct ActiveConversation {
    id: ConversationId,
    pending_turns: usize,
    last_saved_at: DateTime<Utc>,
}

/// Tenants tracked before idle entries are pruned.
const MAX_TRACKED_TENANTS: usize = 1024;

/// Archives conversations to long-term memory as turns accumulate.
///
/// A conversation is saved once `min_new_events` turns arrived since its last
/// save, or `min_interval_secs` elapsed with at least one new turn. When a
/// user moves to another conversation the previous one is saved first.
/// Failures are logged and never reach the caller's turn; the pending count
/// is kept so the next turn retries.
pub struct ArchiveScheduler {
    long_term: Arc<LongTermMemory>,
    store: Arc<ConversationStore>,
    config: AutoArchiveConfig,
    active: Mutex<HashMap<(String, String), ActiveConversation>>,
}

impl ArchiveScheduler {
    pub fn new(
        long_term: Arc<LongTermMemory>,
        store: Arc<ConversationStore>,
        config: AutoArchiveConfig,
    ) -> Self {
        Self {
            long_term,
            store,
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Number of (app, user) pairs with save bookkeeping.
    pub fn tracked(&self) -> usize {
        self.active.lock().len()
    }

    /// Record a turn and archive if a threshold was crossed.
    pub async fn after_turn(&self, conversation: &Conversation) -> Option<ArchiveReport> {
        self.after_turn_at(conversation, Utc::now()).await
    }

    /// [`after_turn`](Self::after_turn) with an explicit clock.
    pub async fn after_turn_at(
        &self,
        conversation: &Conversation,
        now: DateTime<Utc>,
    ) -> Option<ArchiveReport> {
        if !self.config.enabled {
            return None;
        }
        let tenant = (conversation.app.clone(), conversation.user.clone());

        let (previous, due) = {
            let mut active = self.active.lock();
            if active.len() >= MAX_TRACKED_TENANTS && !active.contains_key(&tenant) {
                active.retain(|_, entry| entry.pending_turns > 0);
            }
            let entry = active.entry(tenant).or_insert_with(|| ActiveConversation {
                id: conversation.id.clone(),
                pending_turns: 0,
                last_saved_at: now,
            });
            let previous = if entry.id != conversation.id {
                let previous = (entry.pending_turns > 0).then(|| entry.id.clone());
                *entry = ActiveConversation {
                    id: conversation.id.clone(),
                    pending_turns: 0,
                    last_saved_at: now,
                };
                previous
            } else {
                None
            };
            entry.pending_turns += 1;
            let interval = Duration::seconds(
                i64::try_from(self.config.min_interval_secs).unwrap_or(i64::MAX),
            );
            let due = entry.pending_turns >= self.config.min_new_events
                || now - entry.last_saved_at >= interval;
            (previous, due)
        };

        if let Some(previous) = previous {
            self.save_previous(&conversation.app, &conversation.user, &previous)
                .await;
        }
        if !due {
            return None;
        }
        let report = self.save(conversation).await?;
        self.mark_saved(&conversation.app, &conversation.user, &conversation.id, now);
        Some(report)
    }

    /// Archive the user's active conversation now if it has unsaved turns.
    pub async fn flush(&self, app: &str, user: &str) -> Option<ArchiveReport> {
        let pending = {
            let active = self.active.lock();
            let entry = active.get(&(app.to_string(), user.to_string()))?;
            if entry.pending_turns == 0 {
                return None;
            }
            entry.id.clone()
        };
        match self.store.get_conversation(app, user, &pending).await {
            Ok(conversation) => {
                let report = self.save(&conversation).await?;
                self.mark_saved(app, user, &pending, Utc::now());
                Some(report)
            }
            Err(err) => {
                warn!("auto-archive could not load conversation (app={app}, user={user}, conversation={pending}, error={err})");
                None
            }
        }
    }

    fn mark_saved(&self, app: &str, user: &str, id: &str, now: DateTime<Utc>) {
        let mut active = self.active.lock();
        if let Some(entry) = active.get_mut(&(app.to_string(), user.to_string())) {
            if entry.id == id {
                entry.pending_turns = 0;
                entry.last_saved_at = now;
            }
        }
    }

    async fn save_previous(&self, app: &str, user: &str, id: &str) {
        debug!("conversation switched, saving previous (app={app}, user={user}, conversation={id})");
        match self.store.get_conversation(app, user, id).await {
            Ok(conversation) => {
                self.save(&conversation).await;
            }
            Err(err) => {
                warn!("auto-archive could not load conversation (app={app}, user={user}, conversation={id}, error={err})")
            }
        }
    }

    async fn save(&self, conversation: &Conversation) -> Option<ArchiveReport> {
        match self.long_term.archive(conversation).await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(
                    "auto-archive failed (app={}, user={}, conversation={}, error={err})",
                    conversation.app, conversation.user, conversation.id
                );
                None
            }
        }
    }
}
