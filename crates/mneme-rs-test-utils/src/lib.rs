//! Shared test doubles for Mneme crates.

mod backend;
mod embedder;
mod summarizer;

pub use backend::FlakyBackend;
pub use embedder::{FailingEmbedder, HashEmbedder};
pub use summarizer::{FailingSummarizer, FixedSummarizer, RecordingSummarizer};
