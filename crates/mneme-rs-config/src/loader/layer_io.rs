//! Locating and reading config layer files.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer,
    SYSTEM_CONFIG_PATH, SchemaMode, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::{debug, trace};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Read one layer. Missing files are skipped unless `required` is set.
pub(super) fn read_layer(
    source: ConfigLayerSource,
    path: &Path,
    required: bool,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
            trace!("no {} layer at {}", source.as_str(), path.display());
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    debug!(
        "read config layer (source={}, path={}, bytes={})",
        source.as_str(),
        path.display(),
        contents.len()
    );
    let value: Value = json5::from_str(&contents)?;
    let label = format!("{}({})", source.as_str(), path.display());
    schema::validate_layer_schema(&value, SchemaMode::Partial, &label)?;
    Ok(Some(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    }))
}

/// Machine-wide layer, where the platform has one.
pub(super) fn system_layer_path() -> Option<PathBuf> {
    if cfg!(any(unix, windows)) {
        Some(PathBuf::from(SYSTEM_CONFIG_PATH))
    } else {
        None
    }
}

/// `~/.mneme/mneme.json5`
pub(super) fn user_layer_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}
