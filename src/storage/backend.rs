// src/storage/backend.rs
//! Byte-oriented key/value storage underneath the document store.
//!
//! A backend knows nothing about collections or records: it stores one
//! string value per key, like browser local storage. Two implementations are
//! provided:
//! - [`MemoryStorage`]: process-local map, for tests and embedding
//! - [`FileStorage`]: one `<key>.json` file per key under a root directory

use crate::error::{CertificateError, CertificateResult};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Key/value storage for serialized collections.
pub trait StorageBackend: Send + Sync {
    /// Reads the value stored under `key`, or `None` if nothing was ever written.
    fn get_item(&self, key: &str) -> CertificateResult<Option<String>>;

    /// Replaces the value stored under `key`.
    fn set_item(&self, key: &str, value: &str) -> CertificateResult<()>;
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> CertificateResult<Option<String>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> CertificateResult<()> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed storage with one JSON file per key.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash mid-write leaves the previous value intact.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens (and creates, if needed) the storage directory.
    pub fn open(root: impl AsRef<Path>) -> CertificateResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FileStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> CertificateResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(CertificateError::Validation(format!(
                "invalid storage key `{key}`"
            )));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> CertificateResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> CertificateResult<()> {
        let path = self.path_for(key)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }
}
