//! Config-driven assembly of short-term and long-term memory.

use log::info;
use mneme_rs_config::{ConfigError, MnemeConfig};
use mneme_rs_core::{
    ConversationStore, MnemeCoreError, ShortTermMemory, Summarizer, TranscriptSummarizer,
    TurnOutcome,
};
use mneme_rs_memory::{
    ArchiveReport, ArchiveScheduler, Embedder, LongTermMemory, LongTermOptions, MemoryError,
};
use mneme_rs_protocol::{Event, ScoredRecord};
use mneme_rs_storage::{StorageError, build_backend};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by [`MemoryRuntime`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    ShortTerm(#[from] MnemeCoreError),
    #[error(transparent)]
    LongTerm(#[from] MemoryError),
}

impl RuntimeError {
    /// Whether the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            RuntimeError::Config(_) => false,
            RuntimeError::Storage(err) => err.is_retryable(),
            RuntimeError::ShortTerm(err) => err.is_retryable(),
            RuntimeError::LongTerm(err) => err.is_retryable(),
        }
    }
}

/// Short-term memory, long-term memory and the archive scheduler built from one config.
pub struct MemoryRuntime {
    short_term: ShortTermMemory,
    long_term: Arc<LongTermMemory>,
    archiver: ArchiveScheduler,
}

impl MemoryRuntime {
    /// Build every component described by `config`.
    ///
    /// Without a summarizer the transcript summarizer is used; without an
    /// embedder long-term search ranks by text match.
    pub fn from_config(
        config: &MnemeConfig,
        summarizer: Option<Arc<dyn Summarizer>>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        let store = Arc::new(ConversationStore::new(build_backend(
            &config.short_term.backend,
        )?));
        let summarizer = summarizer.unwrap_or_else(|| {
            Arc::new(TranscriptSummarizer::new(config.compaction.summary_max_chars))
        });
        let short_term = ShortTermMemory::new(store.clone(), summarizer, &config.compaction)?;
        let long_term = Arc::new(LongTermMemory::new(
            build_backend(&config.long_term.backend)?,
            embedder,
            LongTermOptions::from_config(&config.long_term),
        ));
        let archiver = ArchiveScheduler::new(
            long_term.clone(),
            store,
            config.long_term.auto_archive.clone(),
        );
        info!(
            "memory runtime ready (short_term={}, long_term={}, interval={}, overlap={}, auto_archive={})",
            config.short_term.backend.kind,
            config.long_term.backend.kind,
            config.compaction.interval,
            config.compaction.overlap,
            config.long_term.auto_archive.enabled
        );
        Ok(Self {
            short_term,
            long_term,
            archiver,
        })
    }

    pub fn short_term(&self) -> &ShortTermMemory {
        &self.short_term
    }

    pub fn long_term(&self) -> &Arc<LongTermMemory> {
        &self.long_term
    }

    /// Events to feed the model for one conversation.
    pub async fn get_context(
        &self,
        app: &str,
        user: &str,
        conversation: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        Ok(self.short_term.get_context(app, user, conversation).await?)
    }

    /// Record a turn, compact if due, then let the scheduler archive.
    pub async fn record_turn(
        &self,
        app: &str,
        user: &str,
        conversation: &str,
        event: Event,
    ) -> Result<TurnOutcome, RuntimeError> {
        let outcome = self
            .short_term
            .record_turn(app, user, conversation, event)
            .await?;
        self.archiver.after_turn(&outcome.conversation).await;
        Ok(outcome)
    }

    /// Archive a conversation now.
    pub async fn archive_conversation(
        &self,
        app: &str,
        user: &str,
        conversation: &str,
    ) -> Result<ArchiveReport, RuntimeError> {
        let conversation = self
            .short_term
            .get_conversation(app, user, conversation)
            .await?;
        Ok(self.long_term.archive(&conversation).await?)
    }

    /// Search the user's long-term memory with the configured `top_k`.
    pub async fn recall(
        &self,
        app: &str,
        user: &str,
        query: &str,
    ) -> Result<Vec<ScoredRecord>, RuntimeError> {
        Ok(self.long_term.search_default(app, user, query).await?)
    }

    /// Save the user's active conversation if it has unarchived turns.
    pub async fn flush(&self, app: &str, user: &str) -> Option<ArchiveReport> {
        self.archiver.flush(app, user).await
    }
}
