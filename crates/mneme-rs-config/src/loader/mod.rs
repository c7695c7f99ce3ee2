//! Layered configuration loader with environment overrides.
//!
//! Discovers configuration layers (system/user/cwd/runtime), validates schema,
//! merges them, applies `MNEME_*` environment overrides and produces a final
//! `MnemeConfig`.

mod env;
mod layer_io;
mod merge;
mod schema;

#[cfg(test)]
mod tests;

use crate::{CompactionTrigger, ConfigError, MnemeConfig};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub use env::ENV_PREFIX;

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "mneme.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".mneme";

#[cfg(not(windows))]
const SYSTEM_CONFIG_PATH: &str = "/etc/mneme/mneme.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\mneme\\mneme.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: MnemeConfig,
    /// Metadata for each layer considered during load.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// System-wide configuration.
    System,
    /// User-specific configuration.
    User,
    /// Current working directory configuration.
    Cwd,
    /// Runtime overrides.
    Runtime,
    /// Environment variable overrides (highest precedence).
    Env,
}

impl ConfigLayerSource {
    /// Lowercase label used in logs and error paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLayerSource::System => "system",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
            ConfigLayerSource::Env => "env",
        }
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Location on disk if present.
    pub path: Option<PathBuf>,
}

/// Schema validation mode for layered configs.
#[derive(Debug, Clone, Copy)]
enum SchemaMode {
    /// Partial validation for non-final layers.
    Partial,
    /// Full validation for the effective config.
    Full,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find the cwd layer.
    pub cwd: PathBuf,
    /// Optional system config path (defaults to `/etc/mneme/mneme.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// Optional user config path (defaults to `~/.mneme/mneme.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied after file layers.
    pub runtime_paths: Vec<PathBuf>,
    /// Environment variables considered for `MNEME_*` overrides.
    pub env: Vec<(String, String)>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    ///
    /// No environment variables are captured; call `with_process_env` or
    /// `with_env` to opt in.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::system_layer_path(),
            user_config_path: layer_io::user_layer_path(),
            runtime_paths: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add a runtime override config path.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Use an explicit set of environment variables for overrides.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    /// Capture the current process environment for overrides.
    pub fn with_process_env(self) -> Self {
        self.with_env(std::env::vars())
    }
}

impl MnemeConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations and the
    /// process environment.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        let options = LayeredConfigOptions::new(cwd).with_process_env();
        Self::load_layered_with_options(options)
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Layer precedence (low -> high): system, user, cwd, runtime, env.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let mut layers = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());
        let mut seen_paths = HashSet::new();

        let mut candidates = vec![
            (ConfigLayerSource::System, options.system_config_path.clone()),
            (ConfigLayerSource::User, options.user_config_path.clone()),
            (
                ConfigLayerSource::Cwd,
                Some(options.cwd.join(DEFAULT_CONFIG_FILE)),
            ),
        ];
        for path in &options.runtime_paths {
            candidates.push((ConfigLayerSource::Runtime, Some(path.clone())));
        }

        for (source, path) in candidates {
            let Some(path) = path else {
                continue;
            };
            let required = source == ConfigLayerSource::Runtime;
            let Some(layer) = layer_io::read_layer(source, &path, required)? else {
                continue;
            };
            if let Some(path) = &layer.meta.path {
                let unique = path.canonicalize().unwrap_or_else(|_| path.clone());
                if !seen_paths.insert(unique) {
                    debug!(
                        "skipping duplicate layer (source={}, path={})",
                        source.as_str(),
                        path.display()
                    );
                    continue;
                }
            }
            debug!("merged {} layer", source.as_str());
            merge::merge_json_values(&mut merged, &layer.value);
            layers.push(layer.meta);
        }

        let env_overlay = env::env_overlay(&options.env)?;
        if let Some(overlay) = env_overlay {
            debug!("applying environment overrides");
            merge::merge_json_values(&mut merged, &overlay);
            layers.push(ConfigLayer {
                source: ConfigLayerSource::Env,
                path: None,
            });
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Apply `MNEME_*` overrides from the given variables to this config.
    pub fn apply_env_overrides<I, K, V>(self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<Vec<_>>();
        let Some(overlay) = env::env_overlay(&vars)? else {
            return Ok(self);
        };
        let mut value = serde_json::to_value(&self)?;
        merge::merge_json_values(&mut value, &overlay);
        config_from_value(value, "env")
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let compaction = &self.compaction;
        if compaction.interval == 0 {
            return Err(invalid("compaction.interval", "must be greater than zero"));
        }
        if compaction.overlap >= compaction.interval {
            return Err(invalid(
                "compaction.overlap",
                "must be smaller than compaction.interval",
            ));
        }
        if compaction.trigger.uses_time() && compaction.time_threshold_secs.is_none() {
            return Err(invalid(
                "compaction.time_threshold_secs",
                "required when trigger uses elapsed time",
            ));
        }
        if compaction.trigger == CompactionTrigger::Count
            && compaction.time_threshold_secs.is_some()
        {
            return Err(ConfigError::Invalid(
                "compaction.time_threshold_secs is set but trigger is \"count\"; choose \"time\", \"any\" or \"all\"".to_string(),
            ));
        }

        for (path, backend) in [
            ("short_term.backend", &self.short_term.backend),
            ("long_term.backend", &self.long_term.backend),
        ] {
            if backend.kind.requires_path() && backend.path.is_none() {
                return Err(invalid(
                    &format!("{path}.path"),
                    &format!("required for {} backends", backend.kind),
                ));
            }
        }

        if self.long_term.top_k == 0 {
            return Err(invalid("long_term.top_k", "must be greater than zero"));
        }
        if self.long_term.chunk_max_chars == 0 {
            return Err(invalid(
                "long_term.chunk_max_chars",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<MnemeConfig, ConfigError> {
    schema::validate_layer_schema(&value, SchemaMode::Full, label)?;
    let config: MnemeConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

fn invalid(path: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        path: path.to_string(),
        message: message.to_string(),
    }
}
