//! Short-term conversational memory for Mneme.
//!
//! [`ConversationStore`] persists per-conversation event logs through a
//! storage adapter, [`CompactionEngine`] keeps them bounded with sliding
//! window summaries, and [`ShortTermMemory`] ties both together behind the
//! `get_context` / `record_turn` pair an inference loop calls.

pub mod compaction;
pub mod error;
pub mod short_term;
pub mod store;
pub mod summarizer;

/// Compaction engine and trigger policy.
pub use compaction::{CompactionEngine, CompactionOutcome, CompactionPhase, CompactionPolicy};
/// Core error type.
pub use error::MnemeCoreError;
/// Short-term memory manager.
pub use short_term::{ContextHook, ShortTermMemory, TurnOutcome};
/// Conversation persistence.
pub use store::ConversationStore;
/// Summarizer collaborator contract and default implementation.
pub use summarizer::{Summarizer, SummarizerError, TranscriptSummarizer};
