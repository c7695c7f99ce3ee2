//! Storage adapters and tenancy keys for Mneme.
//!
//! Every persistence technology is exposed through the same
//! [`BackendAdapter`] contract; [`build_backend`] maps a config block to an
//! adapter. The [`tenancy`] module computes the key prefixes that isolate
//! applications, users and conversations from each other.

mod adapter;
pub mod backends;
mod document;
mod error;
mod locks;
pub mod tenancy;

/// Backend adapter contract.
pub use adapter::BackendAdapter;
/// Adapter implementations and factory.
pub use backends::{
    InProcessBackend, KeyValueBackend, RelationalBackend, SearchEngineBackend, build_backend,
};
/// Stored document and search types.
pub use document::{Document, SearchHit, SearchQuery, cosine_similarity, text_match_score};
/// Storage error type.
pub use error::StorageError;
/// Per-key async locks.
pub use locks::{KeyGuard, KeyedLocks};
/// Tenancy resolution.
pub use tenancy::{Subsystem, Tenancy, TenancyKey, resolve, resolve_user_scope};

/// Re-export of the backend selection enum from config.
pub use mneme_rs_config::{BackendConfig, BackendKind};
