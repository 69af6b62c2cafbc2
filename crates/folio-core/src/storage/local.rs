//! Key-value storage adapter
//!
//! Keeps the index and each resume as separate JSON strings in a flat
//! [`KvStore`], all under the `folio_` namespace:
//!
//! ```text
//! folio_index          # compact JSON array of ResumeMeta
//! folio_resume_{id}    # compact JSON Resume
//! ```
//!
//! Every save re-reads the whole index, patches one entry and writes it
//! back. That is linear in the number of resumes, which stays small.

use std::any::Any;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::kv::{KvError, KvStore};
use super::{StorageAdapter, StorageError, StorageResult, StorageType};
use crate::models::{sort_by_recent, upsert_meta, Resume, ResumeMeta};

/// Namespace shared by every key this adapter writes
pub const KEY_PREFIX: &str = "folio_";
const INDEX_KEY: &str = "folio_index";
const RESUME_KEY_PREFIX: &str = "folio_resume_";
const PROBE_KEY: &str = "folio_test";

/// Capacity assumed when reporting usage (5 MiB, the common browser limit)
pub const KV_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// Adapter over a flat key-value store
pub struct KeyValueAdapter {
    store: Box<dyn KvStore>,
    ready: bool,
}

impl KeyValueAdapter {
    pub fn new(store: impl KvStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            ready: false,
        }
    }

    /// Approximate bytes used by this adapter's keys and values
    pub fn usage_bytes(&self) -> usize {
        self.store
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(KEY_PREFIX))
            .filter_map(|key| self.store.get(&key).map(|value| key.len() + value.len()))
            .sum()
    }

    /// Usage as a rounded percentage of [`KV_CAPACITY_BYTES`]
    pub fn usage_percent(&self) -> u32 {
        (self.usage_bytes() as f64 / KV_CAPACITY_BYTES as f64 * 100.0).round() as u32
    }

    fn ensure_ready(&self) -> StorageResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(StorageError::NotReady(StorageType::LocalStorage))
        }
    }

    /// Index as stored, in insertion order
    fn load_index(&self) -> StorageResult<Vec<ResumeMeta>> {
        match self.store.get(INDEX_KEY) {
            None => Ok(Vec::new()),
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| StorageError::serialization(INDEX_KEY, e))
            }
        }
    }

    fn write_index(&mut self, index: &[ResumeMeta]) -> StorageResult<()> {
        let json = serde_json::to_string(index)
            .map_err(|e| StorageError::serialization(INDEX_KEY, e))?;
        self.store
            .set(INDEX_KEY, &json)
            .map_err(|e| map_kv_error(INDEX_KEY, e))
    }
}

fn resume_key(id: &str) -> String {
    format!("{}{}", RESUME_KEY_PREFIX, id)
}

pub(super) fn map_kv_error(key: &str, error: KvError) -> StorageError {
    match error {
        KvError::QuotaExceeded { .. } => StorageError::QuotaExceeded {
            key: key.to_string(),
        },
        KvError::Unavailable(msg) => StorageError::Unavailable(msg),
        KvError::Corrupt { path, source } => {
            StorageError::serialization(path.display().to_string(), source)
        }
        KvError::Io { path, source } => StorageError::from_io(source, path),
    }
}

#[async_trait]
impl StorageAdapter for KeyValueAdapter {
    fn storage_type(&self) -> StorageType {
        StorageType::LocalStorage
    }

    async fn init(&mut self) -> StorageResult<()> {
        let probe = self
            .store
            .set(PROBE_KEY, "test")
            .and_then(|_| self.store.remove(PROBE_KEY));

        match probe {
            Ok(()) => {
                self.ready = true;
                info!("Key-value storage ready");
                Ok(())
            }
            Err(KvError::QuotaExceeded { .. }) => {
                self.ready = false;
                warn!("Key-value storage is full");
                Err(StorageError::QuotaExceeded {
                    key: PROBE_KEY.to_string(),
                })
            }
            Err(e) => {
                self.ready = false;
                warn!("Key-value storage unavailable: {}", e);
                Err(StorageError::Unavailable(format!(
                    "{} (private mode or storage full?)",
                    e
                )))
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn list(&self) -> StorageResult<Vec<ResumeMeta>> {
        match self.list_strict().await {
            Err(e @ StorageError::Serialization { .. }) => {
                warn!("Ignoring unreadable resume index: {}", e);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn list_strict(&self) -> StorageResult<Vec<ResumeMeta>> {
        self.ensure_ready()?;
        let mut index = self.load_index()?;
        sort_by_recent(&mut index);
        Ok(index)
    }

    async fn read(&self, id: &str) -> StorageResult<Option<Resume>> {
        self.ensure_ready()?;
        let key = resume_key(id);
        match self.store.get(&key) {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StorageError::serialization(key, e)),
        }
    }

    async fn save(&mut self, resume: &Resume, meta: &ResumeMeta) -> StorageResult<()> {
        self.ensure_ready()?;

        let key = resume_key(&resume.id);
        let json =
            serde_json::to_string(resume).map_err(|e| StorageError::serialization(&key, e))?;
        self.store
            .set(&key, &json)
            .map_err(|e| map_kv_error(&key, e))?;

        let mut index = self.load_index()?;
        upsert_meta(&mut index, meta.clone());
        self.write_index(&index)?;

        debug!("Saved resume {} to key-value storage", resume.id);
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> StorageResult<()> {
        self.ensure_ready()?;

        let key = resume_key(id);
        self.store.remove(&key).map_err(|e| map_kv_error(&key, e))?;

        let mut index = self.load_index()?;
        let before = index.len();
        index.retain(|entry| entry.id != id);
        if index.len() != before {
            self.write_index(&index)?;
        }

        debug!("Deleted resume {} from key-value storage", id);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryKvStore;
    use chrono::{Duration, Utc};

    async fn ready_adapter() -> KeyValueAdapter {
        let mut adapter = KeyValueAdapter::new(MemoryKvStore::new());
        adapter.init().await.unwrap();
        adapter
    }

    fn resume_at(id: &str, title: &str, offset_secs: i64) -> Resume {
        let mut resume = Resume::with_id(id, title);
        resume.updated_at = Utc::now() + Duration::seconds(offset_secs);
        resume
    }

    #[tokio::test]
    async fn test_init_sets_ready_and_cleans_probe() {
        let mut adapter = KeyValueAdapter::new(MemoryKvStore::new());
        assert!(!adapter.is_ready());

        adapter.init().await.unwrap();
        assert!(adapter.is_ready());
        assert!(adapter.store.get(PROBE_KEY).is_none());

        // Calling again is harmless
        adapter.init().await.unwrap();
        assert!(adapter.is_ready());
    }

    #[tokio::test]
    async fn test_init_fails_on_disabled_store() {
        let mut adapter = KeyValueAdapter::new(MemoryKvStore::disabled());
        let err = adapter.init().await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(!adapter.is_ready());
    }

    #[tokio::test]
    async fn test_init_reports_quota() {
        let mut adapter = KeyValueAdapter::new(MemoryKvStore::with_capacity(4));
        let err = adapter.init().await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_operations_require_init() {
        let adapter = KeyValueAdapter::new(MemoryKvStore::new());
        assert!(matches!(
            adapter.list().await,
            Err(StorageError::NotReady(StorageType::LocalStorage))
        ));
        assert!(adapter.read("r1").await.is_err());
    }

    #[tokio::test]
    async fn test_save_list_read_delete() {
        let mut adapter = ready_adapter().await;
        assert!(adapter.list().await.unwrap().is_empty());
        assert!(matches!(
            adapter.list_strict().await.unwrap_err(),
            StorageError::Serialization { .. }
        ));

        let resume = Resume::with_id("r1", "Draft");
        adapter.save(&resume, &resume.meta()).await.unwrap();

        let list = adapter.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "r1");
        assert_eq!(list[0].title, "Draft");

        let loaded = adapter.read("r1").await.unwrap().unwrap();
        assert_eq!(loaded, resume);

        adapter.delete("r1").await.unwrap();
        assert!(adapter.list().await.unwrap().is_empty());
        assert!(adapter.read("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_existing_entry() {
        let mut adapter = ready_adapter().await;
        let mut resume = Resume::with_id("r1", "Draft");
        adapter.save(&resume, &resume.meta()).await.unwrap();

        resume.set_title("Final");
        adapter.save(&resume, &resume.meta()).await.unwrap();

        let list = adapter.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "Final");
    }

    #[tokio::test]
    async fn test_list_sorted_newest_first() {
        let mut adapter = ready_adapter().await;
        for (id, offset) in [("old", -60), ("new", 60), ("mid", 0)] {
            let resume = resume_at(id, id, offset);
            adapter.save(&resume, &resume.meta()).await.unwrap();
        }

        let ids: Vec<_> = adapter
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_ok() {
        let mut adapter = ready_adapter().await;
        adapter.delete("missing").await.unwrap();
        assert!(adapter.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_is_compact_json() {
        let mut adapter = ready_adapter().await;
        let resume = Resume::with_id("r1", "Draft");
        adapter.save(&resume, &resume.meta()).await.unwrap();

        let raw = adapter.store.get(INDEX_KEY).unwrap();
        assert!(raw.starts_with("[{"));
        assert!(!raw.contains('\n'));
        assert!(adapter.store.get("folio_resume_r1").is_some());
    }

    #[tokio::test]
    async fn test_malformed_index_lists_empty_but_blocks_save() {
        let mut adapter = ready_adapter().await;
        adapter.store.set(INDEX_KEY, "{broken").unwrap();

        assert!(adapter.list().await.unwrap().is_empty());
        assert!(matches!(
            adapter.list_strict().await.unwrap_err(),
            StorageError::Serialization { .. }
        ));

        let resume = Resume::with_id("r1", "Draft");
        let err = adapter.save(&resume, &resume.meta()).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_malformed_document_is_serialization_error() {
        let mut adapter = ready_adapter().await;
        adapter.store.set("folio_resume_bad", "nope").unwrap();
        let err = adapter.read("bad").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_quota_on_save() {
        let mut adapter = KeyValueAdapter::new(MemoryKvStore::with_capacity(64));
        adapter.init().await.unwrap();

        let resume = Resume::with_id("r1", "Draft");
        let err = adapter.save(&resume, &resume.meta()).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert!(err.to_string().contains("file system"));
    }

    #[tokio::test]
    async fn test_export_missing_is_not_found() {
        let adapter = ready_adapter().await;
        let err = adapter.export("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_usage_counts_only_namespace() {
        let mut adapter = ready_adapter().await;
        adapter.store.set("unrelated", "x".repeat(1000).as_str()).unwrap();
        assert_eq!(adapter.usage_bytes(), 0);

        let resume = Resume::with_id("r1", "Draft");
        adapter.save(&resume, &resume.meta()).await.unwrap();
        let used = adapter.usage_bytes();
        assert!(used > 0);
        assert_eq!(adapter.usage_percent(), 0);
    }
}
