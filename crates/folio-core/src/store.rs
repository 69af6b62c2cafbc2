//! Application store
//!
//! The `Store` is the entry point for applications. It owns the
//! [`StorageManager`], remembers which backend was selected in the config
//! file and offers the resume operations of the workbench.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open().await?;
//!
//! let resume = store.create_resume("Backend engineer", None).await?;
//! store.rename_resume(&resume.id, "Staff engineer").await?;
//!
//! for meta in store.list_resumes().await? {
//!     println!("{} {}", meta.id, meta.title);
//! }
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, StorageConfig};
use crate::models::{Resume, ResumeMeta, DEFAULT_TEMPLATE};
use crate::storage::{
    validate_id, DefaultAdapterFactory, DirectoryHandle, ExportBlob, MigrationProgress,
    StorageError, StorageManager, StorageType,
};

/// Resume storage with a persisted backend choice
pub struct Store {
    manager: StorageManager,
    config: Config,
    /// Where backend changes are written back
    config_path: PathBuf,
}

impl Store {
    /// Open the store from the default configuration
    pub async fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config, Config::config_file_path()).await
    }

    /// Open the store with a specific configuration
    ///
    /// Backend changes are saved to `config_path`.
    pub async fn open_with_config(config: Config, config_path: impl Into<PathBuf>) -> Result<Self> {
        let manager = StorageManager::new(DefaultAdapterFactory::from_config(&config))
            .context("Failed to create storage manager")?;
        Self::with_manager(manager, config, config_path).await
    }

    /// Open the store over an existing manager
    ///
    /// When the configured backend cannot be made ready the default backend
    /// is used for this session; the config file is left as it was.
    pub async fn with_manager(
        mut manager: StorageManager,
        config: Config,
        config_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        if let Err(e) = manager.init(Some(&config.storage)).await {
            let selected = config.storage.storage_type;
            if selected == StorageType::default() {
                return Err(e).context("Failed to initialize storage");
            }
            warn!(
                "Could not open {} storage ({}), falling back to {}",
                selected,
                e,
                StorageType::default()
            );
            manager
                .init(None)
                .await
                .context("Failed to initialize default storage")?;
        }

        Ok(Self {
            manager,
            config,
            config_path: config_path.into(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manager(&self) -> &StorageManager {
        &self.manager
    }

    pub fn current_type(&self) -> StorageType {
        self.manager.current_type()
    }

    fn save_config(&self) -> Result<()> {
        self.config
            .save_to_path(&self.config_path)
            .context("Failed to save storage selection")
    }

    // ==================== Backend selection ====================

    /// Switch backend and remember the choice
    pub async fn switch_storage(&mut self, storage: StorageConfig) -> Result<()> {
        self.manager
            .switch_adapter(storage.storage_type, Some(&storage))
            .await
            .with_context(|| format!("Failed to switch to {} storage", storage.storage_type))?;

        self.config.storage = storage;
        self.save_config()
    }

    /// Copy all resumes between backends and make the target active
    pub async fn migrate<F>(
        &mut self,
        from: StorageType,
        to: StorageType,
        on_progress: F,
    ) -> Result<usize>
    where
        F: FnMut(&MigrationProgress),
    {
        // Construct with the configured settings so a directory preset applies
        for storage_type in [from, to] {
            self.manager
                .adapter_mut(storage_type, Some(&self.config.storage))
                .with_context(|| format!("Failed to prepare {} storage", storage_type))?;
        }

        let copied = self
            .manager
            .migrate(from, to, on_progress)
            .await
            .with_context(|| format!("Failed to migrate from {} to {}", from, to))?;

        self.config.storage.storage_type = to;
        self.save_config()?;
        Ok(copied)
    }

    /// Use `path` as the file system storage directory
    pub async fn select_directory(&mut self, path: impl Into<PathBuf>) -> Result<DirectoryHandle> {
        let handle = DirectoryHandle::new(path);
        self.manager
            .directory_adapter_mut(Some(&self.config.storage))?
            .select_directory(handle.clone())
            .await
            .with_context(|| format!("Failed to use directory {:?}", handle.path))?;
        Ok(handle)
    }

    /// Forget the granted storage directory
    pub async fn clear_directory_handle(&mut self) -> Result<()> {
        self.manager
            .directory_adapter_mut(Some(&self.config.storage))?
            .clear_handle()
            .await
            .context("Failed to clear directory handle")
    }

    // ==================== Resumes ====================

    /// Stamp and save a resume with its index entry
    pub async fn save_resume(&mut self, resume: &mut Resume) -> Result<()> {
        resume.touch();
        self.manager
            .save(resume, &resume.meta())
            .await
            .with_context(|| format!("Failed to save resume {}", resume.id))
    }

    pub async fn create_resume(&mut self, title: &str, template_id: Option<&str>) -> Result<Resume> {
        let mut resume = Resume::new(title, template_id.unwrap_or(DEFAULT_TEMPLATE));
        self.save_resume(&mut resume).await?;
        info!("Created resume {} ({})", resume.id, resume.title);
        Ok(resume)
    }

    pub async fn get_resume(&self, id: &str) -> Result<Option<Resume>> {
        self.manager
            .read(id)
            .await
            .with_context(|| format!("Failed to read resume {}", id))
    }

    /// Index entries, most recently updated first
    pub async fn list_resumes(&self) -> Result<Vec<ResumeMeta>> {
        self.manager.list().await.context("Failed to list resumes")
    }

    async fn require_resume(&self, id: &str) -> Result<Resume> {
        self.get_resume(id)
            .await?
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() }.into())
    }

    pub async fn rename_resume(&mut self, id: &str, title: &str) -> Result<Resume> {
        let mut resume = self.require_resume(id).await?;
        resume.set_title(title);
        self.save_resume(&mut resume).await?;
        Ok(resume)
    }

    /// Copy a resume under a new id, titled "<title> (copy)"
    pub async fn duplicate_resume(&mut self, id: &str) -> Result<Resume> {
        let mut copy = self.require_resume(id).await?.duplicate();
        self.save_resume(&mut copy).await?;
        info!("Duplicated resume {} as {}", id, copy.id);
        Ok(copy)
    }

    /// Delete a resume; unknown ids are ignored
    pub async fn delete_resume(&mut self, id: &str) -> Result<()> {
        self.manager
            .delete(id)
            .await
            .with_context(|| format!("Failed to delete resume {}", id))
    }

    /// Save a resume from its JSON export, keeping its id when present
    pub async fn import_resume(&mut self, json: &str) -> Result<Resume> {
        let mut resume: Resume =
            serde_json::from_str(json).context("Failed to parse resume JSON")?;
        if resume.id.trim().is_empty() {
            resume.id = Uuid::new_v4().to_string();
        }
        validate_id(&resume.id).context("Imported resume has an unusable id")?;
        self.save_resume(&mut resume).await?;
        info!("Imported resume {} ({})", resume.id, resume.title);
        Ok(resume)
    }

    pub async fn export_resume(&self, id: &str) -> Result<ExportBlob> {
        self.manager
            .export(id)
            .await
            .with_context(|| format!("Failed to export resume {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MigrationStatus, StorageAdapter};
    use std::path::Path;
    use tempfile::TempDir;

    /// Parse a saved config without environment overrides
    fn read_config(path: &Path) -> Config {
        toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().join("data"),
            log_file: None,
            storage: StorageConfig::default(),
        }
    }

    async fn open_store(temp_dir: &TempDir, config: Config) -> Store {
        Store::open_with_config(config, temp_dir.path().join("config.toml"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        let first = store.create_resume("First", None).await.unwrap();
        let second = store.create_resume("", Some("classic")).await.unwrap();

        assert_eq!(first.template_id, "modern");
        assert_eq!(second.title, "Untitled resume");

        let list = store.list_resumes().await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().any(|m| m.id == first.id));
        assert!(list.iter().any(|m| m.id == second.id));
        assert!(list[0].updated_at >= list[1].updated_at);
    }

    #[tokio::test]
    async fn test_rename_updates_index() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        let created = store.create_resume("Draft", None).await.unwrap();
        let renamed = store.rename_resume(&created.id, "Final").await.unwrap();
        assert!(renamed.updated_at >= created.updated_at);

        let list = store.list_resumes().await.unwrap();
        assert_eq!(list[0].title, "Final");
        assert_eq!(
            store.get_resume(&created.id).await.unwrap().unwrap().title,
            "Final"
        );
    }

    #[tokio::test]
    async fn test_rename_unknown_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        let err = store.rename_resume("missing", "x").await.unwrap_err();
        let storage_err = err.downcast_ref::<StorageError>().unwrap();
        assert!(storage_err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        let original = store.create_resume("CV", None).await.unwrap();
        let copy = store.duplicate_resume(&original.id).await.unwrap();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.title, "CV (copy)");
        assert_eq!(store.list_resumes().await.unwrap().len(), 2);

        store.delete_resume(&original.id).await.unwrap();
        store.delete_resume(&original.id).await.unwrap();
        let list = store.list_resumes().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, copy.id);
    }

    #[tokio::test]
    async fn test_import_and_export() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        let imported = store
            .import_resume(r#"{"id": "r9", "title": "Imported"}"#)
            .await
            .unwrap();
        assert_eq!(imported.id, "r9");

        let blob = store.export_resume("r9").await.unwrap();
        assert_eq!(blob.file_name, "Imported.json");
        let parsed: Resume = serde_json::from_slice(&blob.bytes).unwrap();
        assert_eq!(parsed, imported);

        let blank = store.import_resume(r#"{"title": "No id"}"#).await.unwrap();
        assert!(!blank.id.is_empty());

        assert!(store.import_resume("not json").await.is_err());
    }

    #[tokio::test]
    async fn test_import_rejects_escaping_id() {
        let temp_dir = TempDir::new().unwrap();
        let granted = temp_dir.path().join("granted");
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;
        store
            .switch_storage(StorageConfig::file_system(&granted))
            .await
            .unwrap();

        let err = store
            .import_resume(r#"{"id": "/../../escaped", "title": "x"}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::InvalidId { .. })
        ));
        assert!(!temp_dir.path().join("escaped.json").exists());
        assert!(!granted.join("resume-").exists());
        assert!(store.list_resumes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_switch_storage_persists_choice() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        store
            .switch_storage(StorageConfig::file_system(temp_dir.path().join("docs")))
            .await
            .unwrap();
        assert_eq!(store.current_type(), StorageType::FileSystem);

        let saved = read_config(&config_path);
        assert_eq!(saved.storage.storage_type, StorageType::FileSystem);

        // A new session recovers the directory from the handle store
        let reopened = open_store(&temp_dir, saved).await;
        assert_eq!(reopened.current_type(), StorageType::FileSystem);
        assert_eq!(
            reopened.manager().directory_adapter().unwrap().directory_name(),
            "docs"
        );
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_selection() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        assert!(store
            .switch_storage(StorageConfig::new(StorageType::WebDav))
            .await
            .is_err());
        assert_eq!(store.current_type(), StorageType::LocalStorage);
        assert_eq!(store.config().storage.storage_type, StorageType::LocalStorage);
        assert!(!temp_dir.path().join("config.toml").exists());
    }

    #[tokio::test]
    async fn test_unusable_backend_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.storage = StorageConfig::new(StorageType::BaiduDisk);

        let store = open_store(&temp_dir, config).await;
        assert_eq!(store.current_type(), StorageType::LocalStorage);
        assert!(store.manager().is_ready());
        assert_eq!(store.config().storage.storage_type, StorageType::BaiduDisk);
    }

    #[tokio::test]
    async fn test_migrate_persists_target() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let mut config = test_config(&temp_dir);
        config.storage.file_system = Some(crate::config::FileSystemConfig {
            directory_path: temp_dir.path().join("docs"),
        });
        let mut store = open_store(&temp_dir, config).await;

        store.create_resume("One", None).await.unwrap();
        store.create_resume("Two", None).await.unwrap();

        let mut last = None;
        let copied = store
            .migrate(StorageType::LocalStorage, StorageType::FileSystem, |p| {
                last = Some(p.status)
            })
            .await
            .unwrap();

        assert_eq!(copied, 2);
        assert_eq!(last, Some(MigrationStatus::Completed));
        assert_eq!(store.current_type(), StorageType::FileSystem);
        assert_eq!(store.list_resumes().await.unwrap().len(), 2);
        assert!(temp_dir.path().join("docs/index.json").is_file());

        let saved = read_config(&config_path);
        assert_eq!(saved.storage.storage_type, StorageType::FileSystem);
    }

    #[tokio::test]
    async fn test_select_and_clear_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir, test_config(&temp_dir)).await;

        let handle = store
            .select_directory(temp_dir.path().join("picked"))
            .await
            .unwrap();
        assert_eq!(handle.name, "picked");
        assert!(store.manager().directory_adapter().unwrap().is_ready());

        store.clear_directory_handle().await.unwrap();
        let adapter = store.manager().directory_adapter().unwrap();
        assert!(!adapter.is_ready());
        assert_eq!(adapter.directory_name(), "Not selected");
    }
}
