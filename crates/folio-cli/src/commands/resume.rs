//! Resume command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use folio_core::{ResumeMeta, Store};

use crate::output::{short_id, Output};
use crate::prompt::confirm;

/// Create a new resume
pub async fn create(
    store: &mut Store,
    title: String,
    template: Option<String>,
    output: &Output,
) -> Result<()> {
    let resume = store.create_resume(&title, template.as_deref()).await?;

    output.success(&format!("Created resume: {}", resume.id));
    output.print_resume(&resume);
    Ok(())
}

/// List all resumes, most recently updated first
pub async fn list(store: &Store, output: &Output) -> Result<()> {
    let resumes = store.list_resumes().await?;
    output.print_resumes(&resumes);
    Ok(())
}

/// Show a single resume
pub async fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    let id = resolve_id(store, &id).await?;
    let resume = store
        .get_resume(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Resume not found: {}", id))?;

    output.print_resume(&resume);
    Ok(())
}

/// Rename a resume
pub async fn rename(store: &mut Store, id: String, title: String, output: &Output) -> Result<()> {
    let id = resolve_id(store, &id).await?;
    let resume = store.rename_resume(&id, &title).await?;

    output.success(&format!("Renamed resume {} to \"{}\"", short_id(&id), resume.title));
    Ok(())
}

/// Duplicate a resume
pub async fn duplicate(store: &mut Store, id: String, output: &Output) -> Result<()> {
    let id = resolve_id(store, &id).await?;
    let copy = store.duplicate_resume(&id).await?;

    output.success(&format!("Duplicated as: {}", copy.id));
    output.print_resume(&copy);
    Ok(())
}

/// Delete a resume
pub async fn delete(store: &mut Store, id: String, yes: bool, output: &Output) -> Result<()> {
    let id = resolve_id(store, &id).await?;

    if output.should_prompt() && !yes {
        let title = store
            .get_resume(&id)
            .await?
            .map(|r| r.title)
            .unwrap_or_default();
        println!("Delete resume: {} - {}", short_id(&id), title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_resume(&id).await?;

    output.success(&format!("Deleted resume: {}", id));
    Ok(())
}

/// Export a resume as JSON, to a file or stdout
pub async fn export(
    store: &Store,
    id: String,
    path: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let id = resolve_id(store, &id).await?;
    let blob = store.export_resume(&id).await?;

    match path {
        Some(path) => {
            std::fs::write(&path, &blob.bytes)
                .with_context(|| format!("Failed to write {:?}", path))?;
            output.success(&format!("Exported {} to {}", short_id(&id), path.display()));
        }
        None => {
            let text = String::from_utf8_lossy(&blob.bytes);
            println!("{}", text);
        }
    }
    Ok(())
}

/// Import a resume from a JSON export
pub async fn import(store: &mut Store, path: PathBuf, output: &Output) -> Result<()> {
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let resume = store.import_resume(&json).await?;

    output.success(&format!("Imported resume: {}", resume.id));
    output.print_resume(&resume);
    Ok(())
}

/// Resolve a full id or a unique id prefix
async fn resolve_id(store: &Store, id: &str) -> Result<String> {
    let resumes = store.list_resumes().await?;
    match match_id(&resumes, id) {
        Ok(id) => Ok(id),
        Err(matches) if matches.is_empty() => bail!("No resume found matching: {}", id),
        Err(matches) => {
            eprintln!("Multiple resumes match '{}':", id);
            for meta in &matches {
                eprintln!("  {} - {}", meta.id, meta.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Exact match first, then unique prefix. Err carries the candidates.
fn match_id<'a>(resumes: &'a [ResumeMeta], id: &str) -> Result<String, Vec<&'a ResumeMeta>> {
    if let Some(exact) = resumes.iter().find(|meta| meta.id == id) {
        return Ok(exact.id.clone());
    }

    let matches: Vec<_> = resumes
        .iter()
        .filter(|meta| meta.id.starts_with(id))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        _ => Err(matches),
    }
}
