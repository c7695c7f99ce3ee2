//! Long-term memory for Mneme.
//!
//! Archived conversations become chunked, optionally embedded
//! [`MemoryRecord`](mneme_rs_protocol::MemoryRecord)s scoped to one app and
//! user, searchable by similarity or text match.

pub mod autosave;
pub mod chunk;
pub mod embedder;
pub mod error;
pub mod long_term;

/// Automatic archival after turns.
pub use autosave::ArchiveScheduler;
/// Text chunking.
pub use chunk::chunk_text;
/// Embedding collaborator contract.
pub use embedder::{Embedder, EmbeddingError};
/// Memory error type.
pub use error::MemoryError;
/// Long-term memory service.
pub use long_term::{
    ArchiveReport, ChunkOutcome, ChunkStatus, LongTermMemory, LongTermOptions,
};
