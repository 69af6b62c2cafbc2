//! Storage error handling
//!
//! Provides typed errors for adapter operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::StorageType;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Operation attempted before a successful `init()`
    #[error("{0} storage is not ready. Initialize it first.")]
    NotReady(StorageType),

    /// Requested document does not exist
    #[error("Resume '{id}' not found")]
    NotFound { id: String },

    /// Document id cannot be used as a storage key or file name
    #[error("Invalid resume id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },

    /// Key-value store is full
    #[error("Storage quota exceeded while writing '{key}'. Consider switching to file system storage.")]
    QuotaExceeded { key: String },

    /// Key-value store refused the probe write
    #[error("Key-value storage is unavailable: {0}")]
    Unavailable(String),

    /// Directory access was not granted
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// User dismissed the directory picker
    #[error("Directory selection was cancelled")]
    Cancelled,

    /// Host lacks a required capability
    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    /// Persisted JSON could not be parsed or produced
    #[error("Malformed data in '{location}': {source}")]
    Serialization {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    /// Backend identity exists but has no adapter yet
    #[error("{0} storage is not implemented yet")]
    NotImplemented(StorageType),

    /// Migration request is invalid before any work starts
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Migration stopped at an item
    #[error("Migration aborted at '{title}' ({id}): {source}")]
    MigrationAborted {
        id: String,
        title: String,
        #[source]
        source: Box<StorageError>,
    },

    /// Permission denied by the operating system on a path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PathPermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File expected to exist is missing
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PathPermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StorageError::FileNotFound { path },
            _ if is_disk_full_error(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Like [`StorageError::from_io`] but reports non-classified failures as reads
    pub fn from_io_read(error: io::Error, path: PathBuf) -> Self {
        match Self::from_io(error, path) {
            StorageError::WriteError { path, source } => StorageError::ReadError { path, source },
            other => other,
        }
    }

    pub fn serialization(location: impl Into<String>, source: serde_json::Error) -> Self {
        StorageError::Serialization {
            location: location.into(),
            source,
        }
    }

    /// Whether the error only means "this thing does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::FileNotFound { .. }
        )
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::NotReady(_)
                | StorageError::QuotaExceeded { .. }
                | StorageError::DiskFull { .. }
                | StorageError::PermissionDenied(_)
                | StorageError::PathPermissionDenied { .. }
                | StorageError::Cancelled
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::NotReady(_) => {
                Some("Switch to a working backend with `folio storage switch <type>`.")
            }
            StorageError::QuotaExceeded { .. } => {
                Some("Migrate your resumes to file system storage with `folio storage migrate local_storage file_system`.")
            }
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied(_) | StorageError::Cancelled => {
                Some("Choose a directory you can write to with `folio storage pick <path>`.")
            }
            StorageError::PathPermissionDenied { .. } => {
                Some("Check file and directory permissions. You may need to change ownership of the storage directory.")
            }
            StorageError::NotImplemented(_) => {
                Some("Use local_storage or file_system until this backend is available.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
pub(crate) fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from_io(io_err, PathBuf::from("/test/path"));

        assert!(matches!(err, StorageError::PathPermissionDenied { .. }));
        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_not_found_classification() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = StorageError::from_io(io_err, PathBuf::from("/missing/file"));

        assert!(matches!(err, StorageError::FileNotFound { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_disk_full_detection() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = StorageError::from_io(io_err, PathBuf::from("/full/disk"));

        assert!(matches!(err, StorageError::DiskFull { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_read_classification() {
        let io_err = io::Error::new(io::ErrorKind::Other, "device error");
        let err = StorageError::from_io_read(io_err, PathBuf::from("/data/index.json"));
        assert!(matches!(err, StorageError::ReadError { .. }));
    }

    #[test]
    fn test_quota_message_suggests_file_system() {
        let err = StorageError::QuotaExceeded {
            key: "folio_resume_r1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("quota"));
        assert!(msg.contains("file system"));
    }

    #[test]
    fn test_not_implemented_display() {
        let err = StorageError::NotImplemented(StorageType::WebDav);
        assert_eq!(err.to_string(), "WebDAV storage is not implemented yet");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_migration_aborted_keeps_source() {
        let err = StorageError::MigrationAborted {
            id: "r2".to_string(),
            title: "Second".to_string(),
            source: Box::new(StorageError::QuotaExceeded {
                key: "k".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("Second"));
        assert!(msg.contains("quota"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
