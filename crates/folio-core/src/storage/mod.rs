//! Storage layer
//!
//! Resumes are persisted through a [`StorageAdapter`], one per backend.
//!
//! ## Architecture
//!
//! - **Index**: one list of [`ResumeMeta`](crate::models::ResumeMeta) per backend,
//!   so listing never reads full documents
//! - **Detail**: one blob or file per resume, keyed by id
//! - **Manager**: owns the adapters, switches between them and migrates
//!   documents from one backend to another
//!
//! Every save writes the document first and the index second; every delete
//! removes the document first and rewrites the index second. A crash between
//! the two steps can leave the index and the documents out of step, which
//! readers tolerate by treating a listed id without a document as not found.

pub mod adapter;
mod atomic;
pub mod directory;
pub mod error;
pub mod kv;
pub mod local;
pub mod manager;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use adapter::{ExportBlob, StorageAdapter, JSON_MIME_TYPE};
pub use directory::{
    DirectoryAdapter, DirectoryHandle, DirectoryPlatform, FileHandleStore, HandleStore,
    MemoryHandleStore, NativePlatform, PermissionState,
};
pub use error::{StorageError, StorageResult};
pub use kv::{FileKvStore, KvError, KvStore, MemoryKvStore};
pub use local::{KeyValueAdapter, KV_CAPACITY_BYTES};
pub use manager::{AdapterFactory, DefaultAdapterFactory, StorageManager};

/// Backend identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Flat namespaced key-value store
    #[default]
    LocalStorage,
    /// User-granted local directory
    FileSystem,
    #[serde(rename = "webdav")]
    WebDav,
    BaiduDisk,
}

impl StorageType {
    pub const ALL: [StorageType; 4] = [
        StorageType::LocalStorage,
        StorageType::FileSystem,
        StorageType::WebDav,
        StorageType::BaiduDisk,
    ];

    /// Identifier used in config files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::LocalStorage => "local_storage",
            StorageType::FileSystem => "file_system",
            StorageType::WebDav => "webdav",
            StorageType::BaiduDisk => "baidu_disk",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageType::LocalStorage => "Key-value",
            StorageType::FileSystem => "File system",
            StorageType::WebDav => "WebDAV",
            StorageType::BaiduDisk => "Baidu Disk",
        };
        f.write_str(name)
    }
}

impl FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown storage type '{}'. Valid types: local_storage, file_system, webdav, baidu_disk",
                    s
                )
            })
    }
}

/// Phase of a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Snapshot reported to the migration callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub total: usize,
    /// 1-based position of the item being transferred
    pub current: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
    pub status: MigrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationProgress {
    pub fn pending(total: usize) -> Self {
        Self {
            total,
            current: 0,
            current_item: None,
            status: MigrationStatus::Pending,
            error: None,
        }
    }

    pub fn processing(total: usize, current: usize, title: &str) -> Self {
        Self {
            total,
            current,
            current_item: Some(title.to_string()),
            status: MigrationStatus::Processing,
            error: None,
        }
    }

    pub fn failed(total: usize, current: usize, title: &str, error: &StorageError) -> Self {
        Self {
            total,
            current,
            current_item: Some(title.to_string()),
            status: MigrationStatus::Error,
            error: Some(error.to_string()),
        }
    }

    pub fn completed(total: usize) -> Self {
        Self {
            total,
            current: total,
            current_item: None,
            status: MigrationStatus::Completed,
            error: None,
        }
    }

    /// Whole-number percentage, 0 when there is nothing to migrate
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.current as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Check that `id` can name a document in every backend
///
/// Ids become file names in the directory backend and must not reach
/// outside the granted directory.
pub fn validate_id(id: &str) -> StorageResult<()> {
    let reason = if id.trim().is_empty() {
        "id is empty"
    } else if id.contains(['/', '\\']) {
        "id contains a path separator"
    } else if id.contains("..") {
        "id contains '..'"
    } else if id.chars().any(char::is_control) {
        "id contains a control character"
    } else {
        return Ok(());
    };
    Err(StorageError::InvalidId {
        id: id.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("r1").is_ok());
        assert!(validate_id("5f0c8f4e-0d7e-4a53-9d55-0c4f1f8f7a21").is_ok());
        assert!(validate_id("v1.2").is_ok());

        for bad in ["", "  ", "/../../escaped", "a/b", "a\\b", "..", "a..b", "a\nb", "a\0b"] {
            let err = validate_id(bad).unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidId { ref id, .. } if id == bad),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_storage_type_round_trip_names() {
        for ty in StorageType::ALL {
            assert_eq!(ty.as_str().parse::<StorageType>().unwrap(), ty);
        }
        assert_eq!(
            "FILE_SYSTEM".parse::<StorageType>().unwrap(),
            StorageType::FileSystem
        );
        assert!("dropbox".parse::<StorageType>().is_err());
    }

    #[test]
    fn test_storage_type_serde_matches_cli_names() {
        let json = serde_json::to_string(&StorageType::BaiduDisk).unwrap();
        assert_eq!(json, "\"baidu_disk\"");
        for ty in StorageType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(MigrationProgress::pending(0).percent(), 0);
        assert_eq!(MigrationProgress::processing(3, 1, "a").percent(), 33);
        assert_eq!(MigrationProgress::processing(3, 2, "b").percent(), 67);
        assert_eq!(MigrationProgress::completed(3).percent(), 100);
    }

    #[test]
    fn test_failed_progress_carries_message() {
        let err = StorageError::Cancelled;
        let progress = MigrationProgress::failed(2, 2, "Draft", &err);
        assert_eq!(progress.status, MigrationStatus::Error);
        assert_eq!(progress.current_item.as_deref(), Some("Draft"));
        assert_eq!(progress.error.as_deref(), Some("Directory selection was cancelled"));
    }
}
