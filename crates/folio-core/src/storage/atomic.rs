//! Atomic file replacement
//!
//! Data goes to a `.tmp` sibling, is synced, then renamed over the target,
//! so a crash leaves either the old or the new content in place.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

/// Blocking write, for the synchronous key-value store
pub(crate) fn write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path(path);
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
}

/// Async write on `tokio::fs`
pub(crate) async fn write_async(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_path(path);
    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    tokio::fs::rename(&temp_path, path).await
}
