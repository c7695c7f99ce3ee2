//! Schema validation helpers for Mneme JSON5 configuration.

use super::SchemaMode;
use crate::ConfigError;
use serde_json::{Map, Value};

const BACKEND_KINDS: &[&str] = &["in_process", "relational", "key_value", "search_engine"];
const TRIGGERS: &[&str] = &["count", "time", "any", "all"];
const AUTHORS: &[&str] = &["user", "agent", "tool", "system"];

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(
    value: &Value,
    _mode: SchemaMode,
    layer: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &["$schema", "short_term", "long_term", "compaction"],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("short_term") {
        validate_short_term(value, layer, "short_term")?;
    }
    if let Some(value) = map.get("long_term") {
        validate_long_term(value, layer, "long_term")?;
    }
    if let Some(value) = map.get("compaction") {
        validate_compaction(value, layer, "compaction")?;
    }
    Ok(())
}

/// Validate the "short_term" block.
fn validate_short_term(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["backend"], layer, path)?;
    if let Some(value) = map.get("backend") {
        validate_backend(value, layer, &join_path(path, "backend"))?;
    }
    Ok(())
}

/// Validate the "long_term" block.
fn validate_long_term(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "backend",
            "top_k",
            "chunk_max_chars",
            "min_score",
            "archive_authors",
            "auto_archive",
        ],
        layer,
        path,
    )?;

    if let Some(value) = map.get("backend") {
        validate_backend(value, layer, &join_path(path, "backend"))?;
    }
    for key in ["top_k", "chunk_max_chars"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("min_score") {
        if !value.is_null() {
            expect_f64(value, layer, &join_path(path, "min_score"))?;
        }
    }
    if let Some(value) = map.get("archive_authors") {
        let arr = expect_array(value, layer, &join_path(path, "archive_authors"))?;
        for (idx, entry) in arr.iter().enumerate() {
            expect_one_of(
                entry,
                AUTHORS,
                layer,
                &format!("{path}.archive_authors[{idx}]"),
            )?;
        }
    }
    if let Some(value) = map.get("auto_archive") {
        validate_auto_archive(value, layer, &join_path(path, "auto_archive"))?;
    }
    Ok(())
}

/// Validate auto archive thresholds.
fn validate_auto_archive(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["enabled", "min_new_events", "min_interval_secs"],
        layer,
        path,
    )?;
    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    for key in ["min_new_events", "min_interval_secs"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "compaction" block.
fn validate_compaction(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "enabled",
            "interval",
            "overlap",
            "trigger",
            "time_threshold_secs",
            "summary_max_chars",
        ],
        layer,
        path,
    )?;

    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    for key in ["interval", "overlap", "summary_max_chars"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("time_threshold_secs") {
        if !value.is_null() {
            expect_u64(value, layer, &join_path(path, "time_threshold_secs"))?;
        }
    }
    if let Some(value) = map.get("trigger") {
        expect_one_of(value, TRIGGERS, layer, &join_path(path, "trigger"))?;
    }
    Ok(())
}

/// Validate a backend selection block.
fn validate_backend(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["kind", "path"], layer, path)?;
    if let Some(value) = map.get("kind") {
        expect_one_of(value, BACKEND_KINDS, layer, &join_path(path, "kind"))?;
    }
    if let Some(value) = map.get("path") {
        if !value.is_null() {
            expect_string(value, layer, &join_path(path, "path"))?;
        }
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON array or return a typed error.
fn expect_array<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ConfigError> {
    match value {
        Value::Array(arr) => Ok(arr),
        _ => Err(invalid_field(layer, path, "expected array")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect one of a fixed set of string values.
fn expect_one_of(
    value: &Value,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match value.as_str() {
        Some(text) if allowed.contains(&text) => Ok(()),
        _ => Err(invalid_field(
            layer,
            path,
            &format!("expected one of: {}", allowed.join(", ")),
        )),
    }
}

/// Expect a JSON boolean or return a typed error.
fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative integer or return a typed error.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a JSON number or return a typed error.
fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
