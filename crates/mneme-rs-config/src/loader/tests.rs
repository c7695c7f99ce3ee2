//! Tests for configuration loading.

use super::*;
use crate::{BackendKind, CompactionTrigger};
use mneme_rs_protocol::Author;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Options that only consider layers inside the temp dir.
fn isolated_options(root: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(root.join("cwd"));
    options.system_config_path = None;
    options.user_config_path = None;
    options
}

/// Verify that a minimal config parses with defaults.
#[test]
fn parse_minimal_config() {
    let config = MnemeConfig::load_from_str("{}").expect("config");
    assert_eq!(config.short_term.backend.kind, BackendKind::InProcess);
    assert_eq!(config.long_term.backend.kind, BackendKind::SearchEngine);
    assert_eq!(config.compaction.interval, 20);
    assert_eq!(config.compaction.overlap, 2);
    assert_eq!(
        config.long_term.archive_authors,
        vec![Author::User, Author::Agent]
    );
}

/// Parse a fully specified config.
#[test]
fn parse_full_config() {
    let json5 = r#"{
        short_term: { backend: { kind: "relational", path: "/tmp/stm.db" } },
        long_term: {
            backend: { kind: "key_value", path: "/tmp/ltm" },
            top_k: 3,
            archive_authors: ["user"],
            auto_archive: { enabled: true, min_new_events: 4 },
        },
        compaction: { interval: 3, overlap: 1, trigger: "any", time_threshold_secs: 600 },
    }"#;
    let config = MnemeConfig::load_from_str(json5).expect("config");
    assert_eq!(config.short_term.backend.kind, BackendKind::Relational);
    assert_eq!(config.long_term.top_k, 3);
    assert_eq!(config.long_term.auto_archive.min_new_events, 4);
    assert_eq!(config.long_term.auto_archive.min_interval_secs, 60);
    assert_eq!(config.compaction.trigger, CompactionTrigger::Any);
    assert_eq!(config.compaction.time_threshold_secs, Some(600));
}

/// Reject unexpected top-level config keys.
#[test]
fn rejects_unknown_top_level_key() {
    let err = MnemeConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

/// Reject unknown backend names with the offending path.
#[test]
fn rejects_invalid_backend_kind() {
    let err = MnemeConfig::load_from_str(r#"{ short_term: { backend: { kind: "mongo" } } }"#)
        .unwrap_err();
    assert!(format!("{err}").contains("short_term.backend.kind"));
}

/// Overlap must stay below the interval.
#[test]
fn rejects_overlap_not_below_interval() {
    let err =
        MnemeConfig::load_from_str(r#"{ compaction: { interval: 3, overlap: 3 } }"#).unwrap_err();
    assert!(format!("{err}").contains("compaction.overlap"));
}

/// Time-based triggers need a threshold and count triggers must not carry one.
#[test]
fn trigger_and_threshold_must_agree() {
    let err = MnemeConfig::load_from_str(r#"{ compaction: { trigger: "time" } }"#).unwrap_err();
    assert!(format!("{err}").contains("time_threshold_secs"));

    let err = MnemeConfig::load_from_str(r#"{ compaction: { time_threshold_secs: 30 } }"#)
        .unwrap_err();
    assert!(format!("{err}").contains("trigger"));
}

/// File-backed adapters need a path.
#[test]
fn rejects_relational_backend_without_path() {
    let err = MnemeConfig::load_from_str(r#"{ long_term: { backend: { kind: "relational" } } }"#)
        .unwrap_err();
    assert!(format!("{err}").contains("long_term.backend.path"));
}

/// Runtime layers override the cwd layer and env overrides win over both.
#[test]
fn layered_config_precedence() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    write_json5(
        &root.join("cwd").join("mneme.json5"),
        "{ compaction: { interval: 8, overlap: 1 }, long_term: { top_k: 2 } }",
    );
    let runtime = root.join("runtime.json5");
    write_json5(&runtime, "{ compaction: { interval: 6 } }");

    let options = isolated_options(root)
        .with_runtime_path(&runtime)
        .with_env([("MNEME_LONG_TERM_TOP_K", "9")]);
    let layered = MnemeConfig::load_layered_with_options(options).expect("layered");

    assert_eq!(layered.config.compaction.interval, 6);
    assert_eq!(layered.config.compaction.overlap, 1);
    assert_eq!(layered.config.long_term.top_k, 9);
    let sources = layered
        .layers
        .iter()
        .map(|layer| layer.source)
        .collect::<Vec<_>>();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Runtime,
            ConfigLayerSource::Env
        ]
    );
}

/// Missing runtime layers are an error.
#[test]
fn missing_runtime_layer_fails() {
    let temp = TempDir::new().expect("tmp");
    let options = isolated_options(temp.path()).with_runtime_path(temp.path().join("nope.json5"));
    assert!(MnemeConfig::load_layered_with_options(options).is_err());
}

/// Environment overrides apply on top of a programmatic config and are validated.
#[test]
fn apply_env_overrides_validates_result() {
    let config = MnemeConfig::default()
        .apply_env_overrides([
            ("MNEME_COMPACTION_INTERVAL", "4"),
            ("MNEME_COMPACTION_OVERLAP", "1"),
            ("MNEME_SHORT_TERM_BACKEND", "key_value"),
            ("MNEME_SHORT_TERM_PATH", "/tmp/mneme-stm"),
        ])
        .expect("overrides");
    assert_eq!(config.compaction.interval, 4);
    assert_eq!(config.short_term.backend.kind, BackendKind::KeyValue);
    assert_eq!(
        config.short_term.backend.path.as_deref(),
        Some("/tmp/mneme-stm")
    );

    let err = MnemeConfig::default()
        .apply_env_overrides([("MNEME_SHORT_TERM_BACKEND", "relational")])
        .unwrap_err();
    assert!(format!("{err}").contains("short_term.backend.path"));
}
