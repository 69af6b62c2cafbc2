//! Adapter contract implemented by every storage backend

use std::any::Any;

use async_trait::async_trait;

use super::{StorageError, StorageResult, StorageType};
use crate::models::{Resume, ResumeMeta};

/// MIME type attached to exported documents
pub const JSON_MIME_TYPE: &str = "application/json";

/// A self-contained serialized document ready to be handed to a download
/// or written to disk by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBlob {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    /// Suggested file name, derived from the resume title
    pub file_name: String,
}

impl ExportBlob {
    /// Pretty-print a resume as JSON
    pub fn from_resume(resume: &Resume) -> StorageResult<Self> {
        let bytes = serde_json::to_vec_pretty(resume)
            .map_err(|e| StorageError::serialization(format!("export of {}", resume.id), e))?;
        Ok(Self {
            bytes,
            mime_type: JSON_MIME_TYPE,
            file_name: export_file_name(&resume.title),
        })
    }
}

fn export_file_name(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "resume-data.json".to_string()
    } else {
        format!("{}.json", stem)
    }
}

/// Uniform interface over a storage backend
///
/// All operations except [`init`](StorageAdapter::init) require the adapter
/// to be ready. Implementations write the document before its index entry
/// and remove the document before its index entry.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Backend identity
    fn storage_type(&self) -> StorageType;

    /// Make the backend usable (probe, permission request, token check)
    ///
    /// Safe to call again after a failure or after success.
    async fn init(&mut self) -> StorageResult<()>;

    /// True only after a successful `init()` and until readiness is revoked
    fn is_ready(&self) -> bool;

    /// Index entries, newest update first. Empty when no index exists yet.
    async fn list(&self) -> StorageResult<Vec<ResumeMeta>>;

    /// Like `list`, but a malformed index is always an error
    ///
    /// Backends whose `list` tolerates a damaged index override this.
    async fn list_strict(&self) -> StorageResult<Vec<ResumeMeta>> {
        self.list().await
    }

    /// Full document, `None` when the id is unknown
    async fn read(&self, id: &str) -> StorageResult<Option<Resume>>;

    /// Persist the document, then insert or replace its index entry
    async fn save(&mut self, resume: &Resume, meta: &ResumeMeta) -> StorageResult<()>;

    /// Remove the document, then its index entry. Unknown ids are not an error.
    async fn delete(&mut self, id: &str) -> StorageResult<()>;

    /// Serialize a stored document for download
    async fn export(&self, id: &str) -> StorageResult<ExportBlob> {
        let resume = self
            .read(id)
            .await?
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;
        ExportBlob::from_resume(&resume)
    }

    /// Access to backend-specific operations through downcasting
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
