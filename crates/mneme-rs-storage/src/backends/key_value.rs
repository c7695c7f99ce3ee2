//! Key-value adapter storing one JSON file per key.

use crate::adapter::validate_key;
use crate::{BackendAdapter, BackendKind, Document, StorageError};
use async_trait::async_trait;
use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FILE_EXTENSION: &str = "json";
/// Longest hex-encoded key used verbatim as a file name.
const MAX_HEX_NAME_LEN: usize = 200;
const DIGEST_NAME_PREFIX: &str = "sha256-";

/// On-disk file body. The key is kept so digest-named files can be listed.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    document: Document,
}

/// File-per-key adapter.
///
/// Keys that fit are hex encoded into the file name, so keys may contain
/// separators and any other character. Longer keys are stored under the
/// SHA-256 of the key, and `list` reads the key back from the file.
pub struct KeyValueBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl KeyValueBackend {
    /// Open a store rooted at `root`, creating the directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(file_name_for(key))
    }

    fn write_file(path: &Path, key: &str, document: Document) -> Result<(), StorageError> {
        let entry = StoredEntry {
            key: key.to_string(),
            document,
        };
        let data = serde_json::to_vec(&entry)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn read_entry(path: &Path) -> Result<Option<StoredEntry>, StorageError> {
        match fs::read(path) {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Key held by a store file, or `None` for files the store did not write.
    fn key_of(path: &Path) -> Result<Option<String>, StorageError> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
            return Ok(None);
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            return Ok(None);
        };
        if stem.starts_with(DIGEST_NAME_PREFIX) {
            return Ok(Self::read_entry(path)?.map(|entry| entry.key));
        }
        Ok(hex::decode(stem)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok()))
    }
}

fn file_name_for(key: &str) -> String {
    let encoded = hex::encode(key.as_bytes());
    if encoded.len() <= MAX_HEX_NAME_LEN {
        return format!("{encoded}.{FILE_EXTENSION}");
    }
    let digest = Sha256::digest(key.as_bytes());
    format!("{DIGEST_NAME_PREFIX}{}.{FILE_EXTENSION}", hex::encode(digest))
}

#[async_trait]
impl BackendAdapter for KeyValueBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    async fn create(&self, key: &str, initial: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        let _guard = self.write_lock.lock();
        if path.exists() {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        Self::write_file(&path, key, initial)
    }

    async fn read(&self, key: &str) -> Result<Document, StorageError> {
        let path = self.path_for(key);
        match Self::read_entry(&path)? {
            Some(entry) if entry.key == key => Ok(entry.document),
            Some(entry) => {
                warn!(
                    "key_value file holds a different key (path={}, expected={key}, found={})",
                    path.display(),
                    entry.key
                );
                Err(StorageError::NotFound(key.to_string()))
            }
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn write(&self, key: &str, value: Document) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        let _guard = self.write_lock.lock();
        Self::write_file(&path, key, value)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key);
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let Some(key) = Self::key_of(&path)? else {
                if path.extension().and_then(|ext| ext.to_str()) == Some(FILE_EXTENSION) {
                    warn!(
                        "skipping unrecognized file in key_value store (path={})",
                        path.display()
                    );
                }
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
