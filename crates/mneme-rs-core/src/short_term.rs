//! Short-term memory manager: the surface an inference loop talks to.

use crate::{
    CompactionEngine, CompactionOutcome, CompactionPolicy, ConversationStore, MnemeCoreError,
    Summarizer,
};
use log::warn;
use mneme_rs_config::CompactionConfig;
use mneme_rs_protocol::{Conversation, ConversationId, Event};
use serde_json::Value;
use std::sync::Arc;

/// Post-load processor applied to a conversation before it is used as context.
pub type ContextHook = Arc<dyn Fn(Conversation) -> Conversation + Send + Sync>;

/// Result of [`ShortTermMemory::record_turn`].
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Index the event was appended at, before any compaction.
    pub index: usize,
    /// What the compaction check did.
    pub compaction: CompactionOutcome,
    /// Conversation as stored after the turn.
    pub conversation: Conversation,
}

/// Conversation store plus compaction, evaluated synchronously after each turn.
pub struct ShortTermMemory {
    store: Arc<ConversationStore>,
    compaction: CompactionEngine,
    context_hook: Option<ContextHook>,
}

impl ShortTermMemory {
    pub fn new(
        store: Arc<ConversationStore>,
        summarizer: Arc<dyn Summarizer>,
        config: &CompactionConfig,
    ) -> Result<Self, MnemeCoreError> {
        Self::with_policy(store, summarizer, CompactionPolicy::from_config(config)?)
    }

    pub fn with_policy(
        store: Arc<ConversationStore>,
        summarizer: Arc<dyn Summarizer>,
        policy: CompactionPolicy,
    ) -> Result<Self, MnemeCoreError> {
        let compaction = CompactionEngine::new(store.clone(), summarizer, policy)?;
        Ok(Self {
            store,
            compaction,
            context_hook: None,
        })
    }

    /// Install a processor run over every conversation loaded as context.
    pub fn with_context_hook(mut self, hook: ContextHook) -> Self {
        self.context_hook = Some(hook);
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn compaction(&self) -> &CompactionEngine {
        &self.compaction
    }

    pub async fn create_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Conversation, MnemeCoreError> {
        self.store.create_conversation(app, user, id).await
    }

    /// Open a conversation, creating it if needed.
    pub async fn open_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Conversation, MnemeCoreError> {
        self.store.get_or_create_conversation(app, user, id).await
    }

    pub async fn get_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Conversation, MnemeCoreError> {
        self.store.get_conversation(app, user, id).await
    }

    pub async fn list_conversations(
        &self,
        app: &str,
        user: &str,
    ) -> Result<Vec<ConversationId>, MnemeCoreError> {
        self.store.list_conversations(app, user).await
    }

    pub async fn delete_conversation(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<(), MnemeCoreError> {
        self.store.delete_conversation(app, user, id).await
    }

    pub async fn update_state(
        &self,
        app: &str,
        user: &str,
        id: &str,
        key: &str,
        value: Value,
    ) -> Result<Conversation, MnemeCoreError> {
        self.store.update_state(app, user, id, key, value).await
    }

    /// Ordered events to feed the model, partial events excluded.
    pub async fn get_context(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<Vec<Event>, MnemeCoreError> {
        let conversation = self.store.get_conversation(app, user, id).await?;
        let conversation = match &self.context_hook {
            Some(hook) => hook(conversation),
            None => conversation,
        };
        Ok(conversation
            .events
            .into_iter()
            .filter(|event| !event.is_partial)
            .collect())
    }

    /// Append a turn and compact the conversation if its trigger fired.
    ///
    /// The conversation is created on its first turn. A failed summarizer
    /// leaves the conversation uncompacted; storage errors propagate.
    pub async fn record_turn(
        &self,
        app: &str,
        user: &str,
        id: &str,
        event: Event,
    ) -> Result<TurnOutcome, MnemeCoreError> {
        let conversation = self.store.append(app, user, id, event, true).await?;
        let index = conversation.events.len() - 1;
        let compaction = self.compaction.maybe_compact(&conversation).await?;
        let conversation = match &compaction {
            CompactionOutcome::Compacted { .. } => {
                self.store.get_conversation(app, user, id).await?
            }
            CompactionOutcome::Failed { reason } => {
                warn!("turn recorded without compaction (conversation={id}, reason={reason})");
                conversation
            }
            _ => conversation,
        };
        Ok(TurnOutcome {
            index,
            compaction,
            conversation,
        })
    }

    /// Compact a conversation immediately, ignoring the trigger.
    pub async fn compact_now(
        &self,
        app: &str,
        user: &str,
        id: &str,
    ) -> Result<CompactionOutcome, MnemeCoreError> {
        self.compaction.compact(app, user, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::ShortTermMemory;
    use crate::{CompactionPolicy, ConversationStore, MnemeCoreError, TranscriptSummarizer};
    use mneme_rs_config::CompactionConfig;
    use mneme_rs_protocol::{Author, Conversation, Event};
    use mneme_rs_storage::InProcessBackend;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn store() -> Arc<ConversationStore> {
        Arc::new(ConversationStore::new(Arc::new(InProcessBackend::new())))
    }

    fn memory(interval: usize, overlap: usize) -> ShortTermMemory {
        let policy = CompactionPolicy::new(interval, overlap).expect("policy");
        ShortTermMemory::with_policy(store(), Arc::new(TranscriptSummarizer::default()), policy)
            .expect("memory")
    }

    #[test]
    fn config_with_overlap_at_interval_is_rejected() {
        let config = CompactionConfig {
            interval: 2,
            overlap: 2,
            ..CompactionConfig::default()
        };
        let result = ShortTermMemory::new(
            store(),
            Arc::new(TranscriptSummarizer::default()),
            &config,
        );
        assert!(matches!(result, Err(MnemeCoreError::InvalidPolicy(_))));
    }

    #[tokio::test]
    async fn context_excludes_partial_events() {
        let memory = memory(10, 1);
        memory
            .record_turn("app", "u1", "c1", Event::text(Author::User, "hi"))
            .await
            .expect("turn");
        memory
            .record_turn("app", "u1", "c1", Event::text(Author::Agent, "hel").partial())
            .await
            .expect("turn");
        let context = memory.get_context("app", "u1", "c1").await.expect("context");
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].text_content(), "hi");
    }

    #[tokio::test]
    async fn context_hook_runs_after_load() {
        let memory = memory(10, 1).with_context_hook(Arc::new(
            |mut conversation: Conversation| {
                conversation.events.retain(|event| event.author == Author::User);
                conversation
            },
        ));
        for (author, text) in [(Author::User, "q"), (Author::Agent, "a")] {
            memory
                .record_turn("app", "u1", "c1", Event::text(author, text))
                .await
                .expect("turn");
        }
        let context = memory.get_context("app", "u1", "c1").await.expect("context");
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].author, Author::User);
    }

    #[tokio::test]
    async fn compact_now_ignores_trigger() {
        let memory = memory(100, 1);
        for text in ["a", "b", "c"] {
            memory
                .record_turn("app", "u1", "c1", Event::text(Author::User, text))
                .await
                .expect("turn");
        }
        let outcome = memory.compact_now("app", "u1", "c1").await.expect("compact");
        assert!(outcome.is_compacted());
        let conversation = memory
            .get_conversation("app", "u1", "c1")
            .await
            .expect("get");
        assert_eq!(conversation.events.len(), 2);
        assert!(conversation.events[0].is_summary());
    }
}
