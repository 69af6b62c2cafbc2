//! Storage command handlers

use std::path::PathBuf;

use anyhow::Result;

use folio_core::config::FileSystemConfig;
use folio_core::storage::{StorageAdapter, KV_CAPACITY_BYTES};
use folio_core::{StorageType, Store};

use crate::output::{Output, OutputFormat};

/// Show the active backend and its state
pub async fn status(store: &Store, output: &Output) -> Result<()> {
    let manager = store.manager();
    let current = manager.current_type();
    let count = store.list_resumes().await.map(|r| r.len());

    let usage = manager
        .key_value_adapter()
        .map(|kv| (kv.usage_bytes(), kv.usage_percent()));
    let directory = manager.directory_adapter();
    let directory_name = directory.map(|d| d.directory_name()).unwrap_or("Not selected");
    let directory_path = directory.and_then(|d| d.handle()).map(|h| h.path.clone());

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "type": current,
                    "ready": manager.is_ready(),
                    "resumes": count.as_ref().ok(),
                    "resumes_error": count.as_ref().err().map(|e| format!("{:#}", e)),
                    "key_value": usage.map(|(bytes, percent)| serde_json::json!({
                        "used_bytes": bytes,
                        "capacity_bytes": KV_CAPACITY_BYTES,
                        "percent": percent
                    })),
                    "file_system": {
                        "directory": directory_name,
                        "path": directory_path,
                        "ready": directory.map(|d| d.is_ready()).unwrap_or(false)
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", current.as_str());
        }
        OutputFormat::Human => {
            println!("Folio Storage");
            println!("=============");
            println!();
            println!("Active:    {} ({})", current, current.as_str());
            println!(
                "Status:    {}",
                if manager.is_ready() { "ready" } else { "not ready" }
            );
            println!("Resumes:   {}", describe_count(&count));
            println!();
            if let Some((bytes, percent)) = usage {
                println!("Key-value:");
                println!(
                    "  Used: {} of {} ({}%)",
                    human_bytes(bytes),
                    human_bytes(KV_CAPACITY_BYTES),
                    percent
                );
            }
            println!("File system:");
            println!("  Directory: {}", directory_name);
            if let Some(path) = directory_path {
                println!("  Path:      {}", path.display());
            }
        }
    }

    Ok(())
}

/// Switch the active backend
pub async fn switch(
    store: &mut Store,
    storage_type: StorageType,
    directory: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut storage = store.config().storage.clone();
    storage.storage_type = storage_type;

    if let Some(directory) = directory {
        if storage_type == StorageType::FileSystem {
            // An explicit directory wins over any stored handle
            store.select_directory(&directory).await?;
        }
        storage.file_system = Some(FileSystemConfig {
            directory_path: directory,
        });
    }

    store.switch_storage(storage).await?;

    output.success(&format!("Switched to {} storage", storage_type));
    Ok(())
}

/// Copy all resumes from one backend to another
pub async fn migrate(
    store: &mut Store,
    from: StorageType,
    to: StorageType,
    output: &Output,
) -> Result<()> {
    let copied = store
        .migrate(from, to, |progress| output.print_progress(progress))
        .await?;

    output.success(&format!(
        "Migrated {} resume(s) from {} to {}; {} is now active",
        copied, from, to, to
    ));
    Ok(())
}

/// Use a directory for file system storage
pub async fn pick(store: &mut Store, path: PathBuf, output: &Output) -> Result<()> {
    let handle = store.select_directory(path).await?;
    output.success(&format!(
        "Using directory \"{}\" ({})",
        handle.name,
        handle.path.display()
    ));
    Ok(())
}

/// Forget the stored directory
pub async fn clear_handle(store: &mut Store, output: &Output) -> Result<()> {
    store.clear_directory_handle().await?;
    output.success("Cleared stored directory");
    Ok(())
}

/// Format bytes as human-readable string
fn human_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn describe_count(count: &Result<usize>) -> String {
    match count {
        Ok(n) => n.to_string(),
        Err(e) => format!("unknown ({:#})", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_count() {
        assert_eq!(describe_count(&Ok(3)), "3");
        let failed: Result<usize> = Err(anyhow::anyhow!("index is malformed"));
        assert_eq!(describe_count(&failed), "unknown (index is malformed)");
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 bytes");
        assert_eq!(human_bytes(2048), "2.0 KB");
        assert_eq!(human_bytes(KV_CAPACITY_BYTES), "5.0 MB");
    }
}
