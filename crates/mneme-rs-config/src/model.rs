//! Configuration schema for Mneme.

use mneme_rs_protocol::Author;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root config for the memory runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemeConfig {
    #[serde(default, rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub short_term: ShortTermConfig,
    #[serde(default)]
    pub long_term: LongTermConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
}

impl MnemeConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemeConfigBuilder {
        MnemeConfigBuilder::new()
    }
}

/// Builder for assembling a `MnemeConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemeConfigBuilder {
    config: MnemeConfig,
}

impl MnemeConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemeConfig::default(),
        }
    }

    /// Replace the short-term memory configuration.
    pub fn short_term(mut self, short_term: ShortTermConfig) -> Self {
        self.config.short_term = short_term;
        self
    }

    /// Replace the long-term memory configuration.
    pub fn long_term(mut self, long_term: LongTermConfig) -> Self {
        self.config.long_term = long_term;
        self
    }

    /// Replace the compaction configuration.
    pub fn compaction(mut self, compaction: CompactionConfig) -> Self {
        self.config.compaction = compaction;
        self
    }

    /// Finalize and return the built `MnemeConfig`.
    pub fn build(self) -> MnemeConfig {
        self.config
    }
}

/// Storage technology behind a subsystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Process-local map; lost on restart.
    #[default]
    InProcess,
    /// SQLite database file.
    Relational,
    /// Directory of JSON documents, one per key.
    KeyValue,
    /// Vector-capable search index.
    SearchEngine,
}

impl BackendKind {
    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::InProcess => "in_process",
            BackendKind::Relational => "relational",
            BackendKind::KeyValue => "key_value",
            BackendKind::SearchEngine => "search_engine",
        }
    }

    /// Whether the adapter needs a `path` connection parameter.
    pub fn requires_path(&self) -> bool {
        matches!(self, BackendKind::Relational | BackendKind::KeyValue)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selection and connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Database file, document directory, or index snapshot file.
    #[serde(default)]
    pub path: Option<String>,
}

impl BackendConfig {
    /// Convenience constructor for a backend with an optional path.
    pub fn new(kind: BackendKind, path: Option<String>) -> Self {
        Self { kind, path }
    }
}

/// Short-term (conversation) memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShortTermConfig {
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Long-term (cross-conversation) memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermConfig {
    #[serde(default = "default_long_term_backend")]
    pub backend: BackendConfig,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default = "default_archive_authors")]
    pub archive_authors: Vec<Author>,
    #[serde(default)]
    pub auto_archive: AutoArchiveConfig,
}

impl Default for LongTermConfig {
    fn default() -> Self {
        Self {
            backend: default_long_term_backend(),
            top_k: default_top_k(),
            chunk_max_chars: default_chunk_max_chars(),
            min_score: None,
            archive_authors: default_archive_authors(),
            auto_archive: AutoArchiveConfig::default(),
        }
    }
}

/// Default long-term backend: in-process vector index.
fn default_long_term_backend() -> BackendConfig {
    BackendConfig::new(BackendKind::SearchEngine, None)
}

/// Default number of records returned by search.
fn default_top_k() -> usize {
    5
}

/// Default maximum chunk size in characters.
fn default_chunk_max_chars() -> usize {
    1000
}

/// Default authors whose events are archived.
fn default_archive_authors() -> Vec<Author> {
    vec![Author::User, Author::Agent]
}

/// Thresholds for archiving conversations after each turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoArchiveConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_new_events")]
    pub min_new_events: usize,
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
}

impl Default for AutoArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_new_events: default_min_new_events(),
            min_interval_secs: default_min_interval_secs(),
        }
    }
}

/// Default count of new events that forces an archive.
fn default_min_new_events() -> usize {
    10
}

/// Default seconds between archives of one conversation.
fn default_min_interval_secs() -> u64 {
    60
}

/// How count and time triggers combine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompactionTrigger {
    /// Window invocation count reaches `interval`.
    #[default]
    Count,
    /// Time since the last compaction reaches `time_threshold_secs`.
    Time,
    /// Either condition.
    Any,
    /// Both conditions.
    All,
}

impl CompactionTrigger {
    /// Whether this mode consults the elapsed-time threshold.
    pub fn uses_time(&self) -> bool {
        !matches!(self, CompactionTrigger::Count)
    }
}

/// Sliding-window compaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_compaction_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default)]
    pub trigger: CompactionTrigger,
    #[serde(default)]
    pub time_threshold_secs: Option<u64>,
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: default_compaction_enabled(),
            interval: default_interval(),
            overlap: default_overlap(),
            trigger: CompactionTrigger::default(),
            time_threshold_secs: None,
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

/// Compaction is on unless explicitly disabled.
fn default_compaction_enabled() -> bool {
    true
}

/// Default invocations between compactions.
fn default_interval() -> usize {
    20
}

/// Default trailing events kept verbatim.
fn default_overlap() -> usize {
    2
}

/// Default maximum summary size in characters.
fn default_summary_max_chars() -> usize {
    2000
}
