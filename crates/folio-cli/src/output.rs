//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use folio_core::{MigrationProgress, MigrationStatus, Resume, ResumeMeta};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single resume
    pub fn print_resume(&self, resume: &Resume) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", resume.id);
                println!("Title:     {}", resume.title);
                println!("Template:  {}", resume.template_id);
                if !resume.basic.name.is_empty() {
                    println!("Name:      {}", resume.basic.name);
                }
                if !resume.basic.title.is_empty() {
                    println!("Headline:  {}", resume.basic.title);
                }
                println!("Created:   {}", resume.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:   {}", resume.updated_at.format("%Y-%m-%d %H:%M"));
                println!();
                println!(
                    "Sections:  {} experience, {} education, {} skills, {} projects, {} custom",
                    resume.experiences.len(),
                    resume.education.len(),
                    resume.skills.len(),
                    resume.projects.len(),
                    resume.custom_blocks.len()
                );
            }
            OutputFormat::Json => print_json(resume),
            OutputFormat::Quiet => println!("{}", resume.id),
        }
    }

    /// Print index entries
    pub fn print_resumes(&self, resumes: &[ResumeMeta]) {
        match self.format {
            OutputFormat::Human => {
                if resumes.is_empty() {
                    println!("No resumes found.");
                    return;
                }
                for meta in resumes {
                    println!(
                        "{} | {} | {} | {}",
                        short_id(&meta.id),
                        truncate(&meta.title, 40),
                        meta.template_id,
                        meta.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\n{} resume(s)", resumes.len());
            }
            OutputFormat::Json => print_json(&resumes),
            OutputFormat::Quiet => {
                for meta in resumes {
                    println!("{}", meta.id);
                }
            }
        }
    }

    /// Print one migration progress event
    pub fn print_progress(&self, progress: &MigrationProgress) {
        match self.format {
            OutputFormat::Human => match progress.status {
                MigrationStatus::Pending => {
                    println!("Migrating {} resume(s)...", progress.total);
                }
                MigrationStatus::Processing => {
                    println!(
                        "[{}/{}] {:>3}% {}",
                        progress.current,
                        progress.total,
                        progress.percent(),
                        progress.current_item.as_deref().unwrap_or("")
                    );
                }
                MigrationStatus::Completed => {}
                MigrationStatus::Error => {
                    eprintln!(
                        "✗ Failed at {}: {}",
                        progress.current_item.as_deref().unwrap_or("?"),
                        progress.error.as_deref().unwrap_or("unknown error")
                    );
                }
            },
            OutputFormat::Json => {
                if let Ok(line) = serde_json::to_string(progress) {
                    println!("{}", line);
                }
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON: {}", e),
    }
}

/// First 8 characters of an id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
