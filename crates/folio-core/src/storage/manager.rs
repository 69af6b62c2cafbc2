//! Storage manager
//!
//! Owns one adapter per backend, tracks which one is active and copies
//! resumes between backends.
//!
//! Adapters are cached by [`StorageType`]. Switching away from a backend
//! leaves its adapter cached and ready, so switching back neither loses a
//! granted directory nor repeats a permission prompt.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{error, info, warn};

use super::local::map_kv_error;
use super::{
    DirectoryAdapter, ExportBlob, FileHandleStore, FileKvStore, KeyValueAdapter,
    MigrationProgress, NativePlatform, StorageAdapter, StorageError, StorageResult, StorageType,
};
use crate::config::{Config, StorageConfig};
use crate::models::{Resume, ResumeMeta};

/// Builds adapters on first use
pub trait AdapterFactory: Send + Sync {
    fn create(
        &self,
        storage_type: StorageType,
        config: Option<&StorageConfig>,
    ) -> StorageResult<Box<dyn StorageAdapter>>;
}

/// Factory wiring the file-backed stores under the data directory
#[derive(Debug, Clone)]
pub struct DefaultAdapterFactory {
    kv_store_path: PathBuf,
    handle_store_path: PathBuf,
}

impl DefaultAdapterFactory {
    pub fn new(kv_store_path: impl Into<PathBuf>, handle_store_path: impl Into<PathBuf>) -> Self {
        Self {
            kv_store_path: kv_store_path.into(),
            handle_store_path: handle_store_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.kv_store_path(), config.handle_store_path())
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn create(
        &self,
        storage_type: StorageType,
        config: Option<&StorageConfig>,
    ) -> StorageResult<Box<dyn StorageAdapter>> {
        match storage_type {
            StorageType::LocalStorage => {
                let store = FileKvStore::open(&self.kv_store_path).map_err(|e| {
                    map_kv_error(&self.kv_store_path.display().to_string(), e)
                })?;
                Ok(Box::new(KeyValueAdapter::new(store)))
            }
            StorageType::FileSystem => {
                let platform = match config.and_then(|c| c.directory_path()) {
                    Some(path) => NativePlatform::with_directory(path),
                    None => NativePlatform::new(),
                };
                let handles = FileHandleStore::new(&self.handle_store_path);
                Ok(Box::new(DirectoryAdapter::new(platform, handles)))
            }
            StorageType::WebDav | StorageType::BaiduDisk => {
                Err(StorageError::NotImplemented(storage_type))
            }
        }
    }
}

/// Active backend plus the cache of every backend used so far
pub struct StorageManager {
    factory: Box<dyn AdapterFactory>,
    adapters: HashMap<StorageType, Box<dyn StorageAdapter>>,
    current: StorageType,
}

impl StorageManager {
    /// Create a manager with the default backend constructed but not yet
    /// initialized
    pub fn new(factory: impl AdapterFactory + 'static) -> StorageResult<Self> {
        let current = StorageType::default();
        let adapter = factory.create(current, None)?;

        let mut adapters = HashMap::new();
        adapters.insert(current, adapter);

        Ok(Self {
            factory: Box::new(factory),
            adapters,
            current,
        })
    }

    /// Activate the backend named by `config`, or the default backend
    pub async fn init(&mut self, config: Option<&StorageConfig>) -> StorageResult<()> {
        let storage_type = config.map(|c| c.storage_type).unwrap_or_default();
        self.switch_adapter(storage_type, config).await
    }

    pub fn current_type(&self) -> StorageType {
        self.current
    }

    /// Whether the active backend is ready
    pub fn is_ready(&self) -> bool {
        self.adapters
            .get(&self.current)
            .map(|adapter| adapter.is_ready())
            .unwrap_or(false)
    }

    /// Make `storage_type` the active backend
    ///
    /// The adapter is constructed on first use and initialized only when it
    /// is not ready. On failure the previous backend stays active.
    pub async fn switch_adapter(
        &mut self,
        storage_type: StorageType,
        config: Option<&StorageConfig>,
    ) -> StorageResult<()> {
        let adapter = self.adapter_mut(storage_type, config)?;
        if !adapter.is_ready() {
            adapter.init().await?;
        }

        if self.current != storage_type {
            info!("Switched storage from {} to {}", self.current, storage_type);
        }
        self.current = storage_type;
        Ok(())
    }

    /// Cached adapter for `storage_type`, constructing it if needed
    ///
    /// `config` is only consulted when the adapter is constructed.
    pub fn adapter_mut(
        &mut self,
        storage_type: StorageType,
        config: Option<&StorageConfig>,
    ) -> StorageResult<&mut dyn StorageAdapter> {
        let adapter = match self.adapters.entry(storage_type) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.factory.create(storage_type, config)?),
        };
        Ok(adapter.as_mut())
    }

    /// Cached adapter for `storage_type`, if it was ever constructed
    pub fn adapter(&self, storage_type: StorageType) -> Option<&dyn StorageAdapter> {
        self.adapters.get(&storage_type).map(|adapter| adapter.as_ref())
    }

    /// Key-value adapter, for usage reporting
    pub fn key_value_adapter(&self) -> Option<&KeyValueAdapter> {
        self.adapter(StorageType::LocalStorage)
            .and_then(|adapter| adapter.as_any().downcast_ref())
    }

    /// Directory adapter, if constructed
    pub fn directory_adapter(&self) -> Option<&DirectoryAdapter> {
        self.adapter(StorageType::FileSystem)
            .and_then(|adapter| adapter.as_any().downcast_ref())
    }

    /// Directory adapter for picking or clearing the directory, constructing
    /// it if needed
    pub fn directory_adapter_mut(
        &mut self,
        config: Option<&StorageConfig>,
    ) -> StorageResult<&mut DirectoryAdapter> {
        self.adapter_mut(StorageType::FileSystem, config)?
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| {
                StorageError::Unsupported("file system backend is not directory based".to_string())
            })
    }

    fn active(&self) -> StorageResult<&dyn StorageAdapter> {
        self.adapter(self.current)
            .ok_or(StorageError::NotReady(self.current))
    }

    fn active_mut(&mut self) -> StorageResult<&mut dyn StorageAdapter> {
        let current = self.current;
        match self.adapters.get_mut(&current) {
            Some(adapter) => Ok(adapter.as_mut()),
            None => Err(StorageError::NotReady(current)),
        }
    }

    pub async fn list(&self) -> StorageResult<Vec<ResumeMeta>> {
        self.active()?.list().await
    }

    pub async fn read(&self, id: &str) -> StorageResult<Option<Resume>> {
        self.active()?.read(id).await
    }

    pub async fn save(&mut self, resume: &Resume, meta: &ResumeMeta) -> StorageResult<()> {
        self.active_mut()?.save(resume, meta).await
    }

    pub async fn delete(&mut self, id: &str) -> StorageResult<()> {
        self.active_mut()?.delete(id).await
    }

    pub async fn export(&self, id: &str) -> StorageResult<ExportBlob> {
        self.active()?.export(id).await
    }

    /// Copy every resume from `from` into `to`, then make `to` active
    ///
    /// Progress is reported once as pending, once per item before it is
    /// transferred, and once as completed. The first failing item is
    /// reported with an error status and aborts the run; resumes already
    /// copied stay in `to`. Nothing is ever removed from `from`.
    ///
    /// Returns the number of resumes copied.
    pub async fn migrate<F>(
        &mut self,
        from: StorageType,
        to: StorageType,
        mut on_progress: F,
    ) -> StorageResult<usize>
    where
        F: FnMut(&MigrationProgress),
    {
        if from == to {
            return Err(StorageError::InvalidMigration(format!(
                "source and target are both {}",
                from
            )));
        }

        let source = self.adapter_mut(from, None)?;
        if !source.is_ready() {
            source.init().await?;
        }

        // Taken out of the cache so both adapters can be borrowed at once
        let mut target = match self.adapters.remove(&to) {
            Some(adapter) => adapter,
            None => self.factory.create(to, None)?,
        };

        let result = match self.adapters.get(&from) {
            Some(source) => copy_resumes(source.as_ref(), target.as_mut(), &mut on_progress).await,
            None => Err(StorageError::NotReady(from)),
        };
        self.adapters.insert(to, target);

        let copied = result?;
        self.current = to;
        info!("Migrated {} resume(s) from {} to {}", copied, from, to);
        Ok(copied)
    }
}

async fn copy_resumes(
    source: &dyn StorageAdapter,
    target: &mut dyn StorageAdapter,
    on_progress: &mut dyn FnMut(&MigrationProgress),
) -> StorageResult<usize> {
    if !target.is_ready() {
        target.init().await?;
    }

    let index = source.list_strict().await?;
    let total = index.len();
    on_progress(&MigrationProgress::pending(total));

    let mut copied = 0;
    for (position, meta) in index.iter().enumerate() {
        let current = position + 1;
        on_progress(&MigrationProgress::processing(total, current, &meta.title));

        // Only a missing source document is skipped; target failures abort
        let step = match source.read(&meta.id).await {
            Ok(Some(resume)) => target.save(&resume, meta).await.map(|_| true),
            Ok(None) => Ok(false),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        };

        match step {
            Ok(true) => copied += 1,
            Ok(false) => warn!("Skipping resume {}: listed but not stored", meta.id),
            Err(e) => {
                on_progress(&MigrationProgress::failed(total, current, &meta.title, &e));
                error!("Migration aborted at resume {}: {}", meta.id, e);
                return Err(StorageError::MigrationAborted {
                    id: meta.id.clone(),
                    title: meta.title.clone(),
                    source: Box::new(e),
                });
            }
        }
    }

    on_progress(&MigrationProgress::completed(total));
    Ok(copied)
}
