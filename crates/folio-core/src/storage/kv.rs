//! Flat string key-value stores
//!
//! The key-value adapter works against [`KvStore`], a synchronous
//! string-to-string map shaped like a browser's `localStorage`. Two
//! implementations are provided:
//!
//! - [`MemoryKvStore`]: in-process map with an optional byte capacity
//! - [`FileKvStore`]: the same map persisted as one JSON object file,
//!   rewritten atomically on every mutation

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::atomic;
use super::error::is_disk_full_error;

/// Errors raised by a key-value store
#[derive(Error, Debug)]
pub enum KvError {
    /// Writing the value would exceed the store's capacity
    #[error("quota exceeded writing '{key}'")]
    QuotaExceeded { key: String },

    /// Store refuses writes (disabled, private mode, read-only medium)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store file '{path}' is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// String key-value storage
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError>;

    /// Removing a missing key is a no-op
    fn remove(&mut self, key: &str) -> Result<(), KvError>;

    fn keys(&self) -> Vec<String>;
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: BTreeMap<String, String>,
    /// Maximum of key plus value lengths summed over all entries
    capacity: Option<usize>,
    disabled: bool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once `bytes` would be exceeded
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            capacity: Some(bytes),
            ..Self::default()
        }
    }

    /// Store that rejects every write, like a browser in private mode
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        if self.disabled {
            return Err(KvError::Unavailable("writes are disabled".to_string()));
        }
        if let Some(capacity) = self.capacity {
            if self.used_bytes_without(key) + key.len() + value.len() > capacity {
                return Err(KvError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Key-value store backed by a single JSON file
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileKvStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| KvError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(KvError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), KvError> {
        let data = serde_json::to_vec(&self.entries).map_err(|source| KvError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        atomic::write(&self.path, &data).map_err(|source| classify_io(&self.path, source))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist() {
            // Keep memory in step with what is on disk
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(match e {
                KvError::Io { ref source, .. } if is_disk_full_error(source) => {
                    KvError::QuotaExceeded {
                        key: key.to_string(),
                    }
                }
                other => other,
            });
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist() {
            self.entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

fn classify_io(path: &Path, source: io::Error) -> KvError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        return KvError::Unavailable(format!("{}: {}", path.display(), source));
    }
    KvError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_basic_ops() {
        let mut store = MemoryKvStore::new();
        assert!(store.get("a").is_none());

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_memory_store_capacity() {
        let mut store = MemoryKvStore::with_capacity(10);
        store.set("k", "12345").unwrap();
        // Replacing a value only counts the new size
        store.set("k", "123456789").unwrap();

        let err = store.set("other", "x").unwrap_err();
        assert!(matches!(err, KvError::QuotaExceeded { ref key } if key == "other"));
        assert!(store.get("other").is_none());
    }

    #[test]
    fn test_disabled_store_rejects_writes() {
        let mut store = MemoryKvStore::disabled();
        assert!(matches!(
            store.set("k", "v"),
            Err(KvError::Unavailable(_))
        ));
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("kv.json");

        {
            let mut store = FileKvStore::open(&path).unwrap();
            store.set("folio_index", "[]").unwrap();
            store.set("folio_resume_r1", "{}").unwrap();
            store.remove("folio_resume_r1").unwrap();
        }

        let store = FileKvStore::open(&path).unwrap();
        assert_eq!(store.get("folio_index").as_deref(), Some("[]"));
        assert!(store.get("folio_resume_r1").is_none());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKvStore::open(temp_dir.path().join("absent.json")).unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_file_store_rejects_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kv.json");
        fs::write(&path, "not json").unwrap();

        let err = FileKvStore::open(&path).unwrap_err();
        assert!(matches!(err, KvError::Corrupt { .. }));
    }
}
