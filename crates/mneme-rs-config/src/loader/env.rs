//! `MNEME_*` environment variable overrides.

use crate::ConfigError;
use log::debug;
use serde_json::{Map, Value};

/// Prefix shared by all recognized environment variables.
pub const ENV_PREFIX: &str = "MNEME_";

/// How a variable's text is turned into JSON.
#[derive(Debug, Clone, Copy)]
enum EnvValueKind {
    Text,
    Bool,
    Integer,
    Number,
}

/// Variable suffix, target config path, and value kind.
const ENV_KEYS: &[(&str, &[&str], EnvValueKind)] = &[
    (
        "SHORT_TERM_BACKEND",
        &["short_term", "backend", "kind"],
        EnvValueKind::Text,
    ),
    (
        "SHORT_TERM_PATH",
        &["short_term", "backend", "path"],
        EnvValueKind::Text,
    ),
    (
        "LONG_TERM_BACKEND",
        &["long_term", "backend", "kind"],
        EnvValueKind::Text,
    ),
    (
        "LONG_TERM_PATH",
        &["long_term", "backend", "path"],
        EnvValueKind::Text,
    ),
    ("LONG_TERM_TOP_K", &["long_term", "top_k"], EnvValueKind::Integer),
    (
        "LONG_TERM_MIN_SCORE",
        &["long_term", "min_score"],
        EnvValueKind::Number,
    ),
    (
        "AUTO_ARCHIVE_ENABLED",
        &["long_term", "auto_archive", "enabled"],
        EnvValueKind::Bool,
    ),
    (
        "COMPACTION_ENABLED",
        &["compaction", "enabled"],
        EnvValueKind::Bool,
    ),
    (
        "COMPACTION_INTERVAL",
        &["compaction", "interval"],
        EnvValueKind::Integer,
    ),
    (
        "COMPACTION_OVERLAP",
        &["compaction", "overlap"],
        EnvValueKind::Integer,
    ),
    (
        "COMPACTION_TRIGGER",
        &["compaction", "trigger"],
        EnvValueKind::Text,
    ),
    (
        "COMPACTION_TIME_THRESHOLD_SECS",
        &["compaction", "time_threshold_secs"],
        EnvValueKind::Integer,
    ),
];

/// Build a JSON overlay from recognized variables, or None if none are set.
pub(super) fn env_overlay(vars: &[(String, String)]) -> Result<Option<Value>, ConfigError> {
    let mut overlay = Value::Object(Map::new());
    let mut applied = 0usize;
    for (name, raw) in vars {
        let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let Some((_, path, kind)) = ENV_KEYS.iter().find(|(key, _, _)| *key == suffix) else {
            debug!("ignoring unrecognized environment variable (name={name})");
            continue;
        };
        let value = parse_value(name, raw, *kind)?;
        insert_path(&mut overlay, path, value);
        applied += 1;
    }
    if applied == 0 {
        return Ok(None);
    }
    debug!("collected environment overrides (count={applied})");
    Ok(Some(overlay))
}

fn parse_value(name: &str, raw: &str, kind: EnvValueKind) -> Result<Value, ConfigError> {
    let raw = raw.trim();
    let invalid = |message: &str| ConfigError::InvalidField {
        path: format!("env:{name}"),
        message: message.to_string(),
    };
    match kind {
        EnvValueKind::Text => Ok(Value::String(raw.to_string())),
        EnvValueKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(invalid("expected bool")),
        },
        EnvValueKind::Integer => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| invalid("expected integer")),
        EnvValueKind::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("expected number")),
    }
}

fn insert_path(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = root;
    for key in parents {
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Value::Object(map) = cursor {
        map.insert((*last).to_string(), value);
    }
}
