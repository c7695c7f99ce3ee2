//! Backend adapter implementations and the config-driven factory.

mod in_process;
mod key_value;
mod relational;
mod search_engine;

pub use in_process::InProcessBackend;
pub use key_value::KeyValueBackend;
pub use relational::RelationalBackend;
pub use search_engine::SearchEngineBackend;

use crate::{BackendAdapter, BackendConfig, BackendKind, StorageError};
use log::info;
use std::sync::Arc;

/// Build the adapter selected by a backend config block.
///
/// `relational` and `key_value` require a path; `search_engine` persists a
/// snapshot when a path is given and stays in memory otherwise.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>, StorageError> {
    let adapter: Arc<dyn BackendAdapter> = match config.kind {
        BackendKind::InProcess => Arc::new(InProcessBackend::new()),
        BackendKind::Relational => Arc::new(RelationalBackend::open(required_path(config)?)?),
        BackendKind::KeyValue => Arc::new(KeyValueBackend::open(required_path(config)?)?),
        BackendKind::SearchEngine => match config.path.as_deref() {
            Some(path) => Arc::new(SearchEngineBackend::open(path)?),
            None => Arc::new(SearchEngineBackend::new()),
        },
    };
    info!(
        "storage backend ready (kind={}, path={})",
        config.kind,
        config.path.as_deref().unwrap_or("-")
    );
    Ok(adapter)
}

fn required_path(config: &BackendConfig) -> Result<&str, StorageError> {
    config
        .path
        .as_deref()
        .ok_or_else(|| StorageError::Config(format!("backend `{}` requires a path", config.kind)))
}

#[cfg(test)]
mod tests {
    use super::build_backend;
    use crate::{BackendConfig, BackendKind, StorageError};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn builds_each_kind() {
        let temp = tempdir().expect("tempdir");
        let db = temp.path().join("db.sqlite");
        let kv = temp.path().join("kv");
        let cases = [
            BackendConfig::new(BackendKind::InProcess, None),
            BackendConfig::new(BackendKind::Relational, Some(db.display().to_string())),
            BackendConfig::new(BackendKind::KeyValue, Some(kv.display().to_string())),
            BackendConfig::new(BackendKind::SearchEngine, None),
        ];
        for config in cases {
            let adapter = build_backend(&config).expect("adapter");
            assert_eq!(adapter.kind(), config.kind);
        }
    }

    #[test]
    fn file_backends_require_a_path() {
        let err = build_backend(&BackendConfig::new(BackendKind::KeyValue, None))
            .err()
            .expect("error");
        assert!(matches!(err, StorageError::Config(_)));
    }
}
