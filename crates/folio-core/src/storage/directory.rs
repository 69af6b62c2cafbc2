//! Directory storage adapter
//!
//! Stores resumes as files inside a directory the user granted access to.
//!
//! ## Layout
//!
//! ```text
//! <granted directory>/
//! ├── index.json          # pretty-printed JSON array of ResumeMeta
//! └── resume-{id}.json    # one pretty-printed Resume per file
//! ```
//!
//! ## Readiness
//!
//! Access is represented by a [`DirectoryHandle`] whose permission is
//! reported by the host [`DirectoryPlatform`] as a [`PermissionState`].
//! `init()` tries, in order:
//!
//! 1. the handle already held in memory, if still granted
//! 2. the handle persisted in the [`HandleStore`] under [`HANDLE_KEY`],
//!    re-requesting permission when the platform allows a prompt
//! 3. the interactive picker ([`DirectoryAdapter::pick_directory`])
//!
//! When the picker is dismissed `init()` fails with
//! [`StorageError::Cancelled`] and the caller retries through
//! `pick_directory()` from a context allowed to show it.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{atomic, validate_id, StorageAdapter, StorageError, StorageResult, StorageType};
use crate::models::{sort_by_recent, upsert_meta, Resume, ResumeMeta};

/// Key under which the granted handle is persisted
pub const HANDLE_KEY: &str = "directory-handle";
pub const INDEX_FILE_NAME: &str = "index.json";
pub const RESUME_FILE_PREFIX: &str = "resume-";
const RESUME_FILE_EXT: &str = ".json";
const NOT_SELECTED: &str = "Not selected";

/// Revocable reference to a granted directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryHandle {
    pub path: PathBuf,
    /// Display name, the last path component
    pub name: String,
}

impl DirectoryHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}

/// Access state of a handle as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    /// Not granted yet, but the host may ask the user
    Prompt,
    Denied,
}

/// Host capabilities the directory adapter depends on
#[async_trait]
pub trait DirectoryPlatform: Send + Sync {
    /// Whether directory access exists at all on this host
    fn is_supported(&self) -> bool {
        true
    }

    /// Current permission without side effects
    async fn query_permission(&self, handle: &DirectoryHandle) -> StorageResult<PermissionState>;

    /// Ask for permission; may wait on the user
    async fn request_permission(&self, handle: &DirectoryHandle)
        -> StorageResult<PermissionState>;

    /// Let the user choose a directory. `None` means the picker was dismissed.
    async fn pick_directory(&self) -> StorageResult<Option<DirectoryHandle>>;
}

/// Small persistent map holding granted handles across sessions
#[async_trait]
pub trait HandleStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<DirectoryHandle>>;

    async fn put(&mut self, key: &str, handle: &DirectoryHandle) -> StorageResult<()>;

    async fn delete(&mut self, key: &str) -> StorageResult<()>;
}

/// Local filesystem as a directory platform
///
/// There is no interactive picker on a terminal, so the "picked" directory
/// is the one configured up front. A missing directory whose parent exists
/// is reported as [`PermissionState::Prompt`] and created on request.
#[derive(Debug, Default, Clone)]
pub struct NativePlatform {
    preset: Option<PathBuf>,
}

impl NativePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform whose picker answers with `path`
    pub fn with_directory(path: impl Into<PathBuf>) -> Self {
        Self {
            preset: Some(path.into()),
        }
    }
}

#[async_trait]
impl DirectoryPlatform for NativePlatform {
    async fn query_permission(&self, handle: &DirectoryHandle) -> StorageResult<PermissionState> {
        match fs::metadata(&handle.path).await {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
                Ok(PermissionState::Granted)
            }
            Ok(_) => Ok(PermissionState::Denied),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let parent_exists = match handle.path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => {
                        fs::metadata(parent).await.map(|m| m.is_dir()).unwrap_or(false)
                    }
                    _ => false,
                };
                Ok(if parent_exists {
                    PermissionState::Prompt
                } else {
                    PermissionState::Denied
                })
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(PermissionState::Denied),
            Err(e) => Err(StorageError::from_io_read(e, handle.path.clone())),
        }
    }

    async fn request_permission(
        &self,
        handle: &DirectoryHandle,
    ) -> StorageResult<PermissionState> {
        match self.query_permission(handle).await? {
            PermissionState::Prompt => match fs::create_dir_all(&handle.path).await {
                Ok(()) => Ok(PermissionState::Granted),
                Err(e) => {
                    warn!("Could not create {:?}: {}", handle.path, e);
                    Ok(PermissionState::Denied)
                }
            },
            state => Ok(state),
        }
    }

    async fn pick_directory(&self) -> StorageResult<Option<DirectoryHandle>> {
        Ok(self.preset.as_ref().map(DirectoryHandle::new))
    }
}

/// Handle store persisted as a JSON object file
#[derive(Debug, Clone)]
pub struct FileHandleStore {
    path: PathBuf,
}

impl FileHandleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> StorageResult<BTreeMap<String, DirectoryHandle>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StorageError::serialization(self.path.display().to_string(), e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::from_io_read(e, self.path.clone())),
        }
    }

    async fn store(&self, handles: &BTreeMap<String, DirectoryHandle>) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(handles)
            .map_err(|e| StorageError::serialization(self.path.display().to_string(), e))?;
        write_file(&self.path, &json).await
    }
}

#[async_trait]
impl HandleStore for FileHandleStore {
    async fn get(&self, key: &str) -> StorageResult<Option<DirectoryHandle>> {
        Ok(self.load().await?.remove(key))
    }

    async fn put(&mut self, key: &str, handle: &DirectoryHandle) -> StorageResult<()> {
        let mut handles = self.load().await?;
        handles.insert(key.to_string(), handle.clone());
        self.store(&handles).await
    }

    async fn delete(&mut self, key: &str) -> StorageResult<()> {
        let mut handles = self.load().await?;
        if handles.remove(key).is_some() {
            self.store(&handles).await?;
        }
        Ok(())
    }
}

/// In-memory handle store, forgotten at process exit
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    handles: HashMap<String, DirectoryHandle>,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HandleStore for MemoryHandleStore {
    async fn get(&self, key: &str) -> StorageResult<Option<DirectoryHandle>> {
        Ok(self.handles.get(key).cloned())
    }

    async fn put(&mut self, key: &str, handle: &DirectoryHandle) -> StorageResult<()> {
        self.handles.insert(key.to_string(), handle.clone());
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> StorageResult<()> {
        self.handles.remove(key);
        Ok(())
    }
}

/// Adapter storing resumes as files in a granted directory
pub struct DirectoryAdapter {
    platform: Box<dyn DirectoryPlatform>,
    handles: Box<dyn HandleStore>,
    handle: Option<DirectoryHandle>,
    ready: bool,
}

impl DirectoryAdapter {
    pub fn new(
        platform: impl DirectoryPlatform + 'static,
        handles: impl HandleStore + 'static,
    ) -> Self {
        Self {
            platform: Box::new(platform),
            handles: Box::new(handles),
            handle: None,
            ready: false,
        }
    }

    /// Show the picker and adopt the chosen directory
    pub async fn pick_directory(&mut self) -> StorageResult<()> {
        if !self.platform.is_supported() {
            return Err(StorageError::Unsupported(
                "directory access is not available on this platform".to_string(),
            ));
        }

        match self.platform.pick_directory().await? {
            Some(handle) => self.select_directory(handle).await,
            None => Err(StorageError::Cancelled),
        }
    }

    /// Adopt a directory chosen outside the adapter
    ///
    /// Permission is requested if needed and the handle is persisted so the
    /// next session can recover it.
    pub async fn select_directory(&mut self, handle: DirectoryHandle) -> StorageResult<()> {
        let state = match self.platform.query_permission(&handle).await? {
            PermissionState::Prompt => self.platform.request_permission(&handle).await?,
            state => state,
        };
        if state != PermissionState::Granted {
            return Err(StorageError::PermissionDenied(format!(
                "no write access to '{}'",
                handle.path.display()
            )));
        }

        self.handles.put(HANDLE_KEY, &handle).await?;
        info!("Using directory {:?} for resume storage", handle.path);
        self.handle = Some(handle);
        self.ready = true;
        Ok(())
    }

    /// Forget the granted directory, here and in the handle store
    pub async fn clear_handle(&mut self) -> StorageResult<()> {
        self.handles.delete(HANDLE_KEY).await?;
        self.handle = None;
        self.ready = false;
        info!("Cleared stored directory handle");
        Ok(())
    }

    /// Name of the granted directory for display
    pub fn directory_name(&self) -> &str {
        self.handle
            .as_ref()
            .map(|h| h.name.as_str())
            .unwrap_or(NOT_SELECTED)
    }

    pub fn handle(&self) -> Option<&DirectoryHandle> {
        self.handle.as_ref()
    }

    /// Try to adopt `handle` without showing the picker
    async fn try_recover(&mut self, handle: DirectoryHandle) -> bool {
        let state = match self.platform.query_permission(&handle).await {
            Ok(PermissionState::Prompt) => self.platform.request_permission(&handle).await,
            other => other,
        };

        match state {
            Ok(PermissionState::Granted) => {
                debug!("Recovered directory handle {:?}", handle.path);
                self.handle = Some(handle);
                self.ready = true;
                true
            }
            Ok(state) => {
                debug!("Stored directory handle not usable: {:?}", state);
                false
            }
            Err(e) => {
                warn!("Failed to recover directory handle: {}", e);
                false
            }
        }
    }

    fn dir(&self) -> StorageResult<&Path> {
        match (&self.handle, self.ready) {
            (Some(handle), true) => Ok(&handle.path),
            _ => Err(StorageError::NotReady(StorageType::FileSystem)),
        }
    }

    async fn write_index(&self, dir: &Path, index: &[ResumeMeta]) -> StorageResult<()> {
        let path = dir.join(INDEX_FILE_NAME);
        let json = serde_json::to_vec_pretty(index)
            .map_err(|e| StorageError::serialization(INDEX_FILE_NAME, e))?;
        write_file(&path, &json).await
    }
}

/// File name for a document, refusing ids that would leave the directory
fn resume_file_name(id: &str) -> StorageResult<String> {
    validate_id(id)?;
    Ok(format!("{}{}{}", RESUME_FILE_PREFIX, id, RESUME_FILE_EXT))
}

#[async_trait]
impl StorageAdapter for DirectoryAdapter {
    fn storage_type(&self) -> StorageType {
        StorageType::FileSystem
    }

    async fn init(&mut self) -> StorageResult<()> {
        if let Some(handle) = self.handle.clone() {
            if self.try_recover(handle).await {
                return Ok(());
            }
            self.handle = None;
            self.ready = false;
        }

        match self.handles.get(HANDLE_KEY).await {
            Ok(Some(handle)) => {
                if self.try_recover(handle).await {
                    info!("File system storage ready ({})", self.directory_name());
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Could not read stored directory handle: {}", e),
        }

        self.pick_directory().await
    }

    fn is_ready(&self) -> bool {
        self.ready && self.handle.is_some()
    }

    async fn list(&self) -> StorageResult<Vec<ResumeMeta>> {
        let path = self.dir()?.join(INDEX_FILE_NAME);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from_io_read(e, path)),
        };

        let mut index: Vec<ResumeMeta> = serde_json::from_str(&content)
            .map_err(|e| StorageError::serialization(path.display().to_string(), e))?;
        sort_by_recent(&mut index);
        Ok(index)
    }

    async fn read(&self, id: &str) -> StorageResult<Option<Resume>> {
        let path = self.dir()?.join(resume_file_name(id)?);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from_io_read(e, path)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::serialization(path.display().to_string(), e))
    }

    async fn save(&mut self, resume: &Resume, meta: &ResumeMeta) -> StorageResult<()> {
        let dir = self.dir()?.to_path_buf();

        let path = dir.join(resume_file_name(&resume.id)?);
        let json = serde_json::to_vec_pretty(resume)
            .map_err(|e| StorageError::serialization(path.display().to_string(), e))?;
        write_file(&path, &json).await?;

        let mut index = self.list().await?;
        upsert_meta(&mut index, meta.clone());
        self.write_index(&dir, &index).await?;

        debug!("Saved resume {} to {:?}", resume.id, path);
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> StorageResult<()> {
        let dir = self.dir()?.to_path_buf();

        let path = dir.join(resume_file_name(id)?);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::from_io(e, path)),
        }

        let mut index = self.list().await?;
        let before = index.len();
        index.retain(|entry| entry.id != id);
        if index.len() != before {
            self.write_index(&dir, &index).await?;
        }

        debug!("Deleted resume {} from {:?}", id, dir);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
    atomic::write_async(path, data)
        .await
        .map_err(|e| StorageError::from_io(e, path.to_path_buf()))
}
