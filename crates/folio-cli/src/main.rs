//! Folio CLI
//!
//! Command-line interface for Folio - resumes stored in switchable backends.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use folio_core::{Config, StorageError, StorageType, Store};

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio - resumes with pluggable storage")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage resumes
    Resume {
        #[command(subcommand)]
        command: ResumeCommands,
    },
    /// Inspect, switch and migrate storage backends
    Storage {
        #[command(subcommand)]
        command: StorageCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ResumeCommands {
    /// Create a new resume
    #[command(alias = "new")]
    Create {
        /// Resume title
        title: String,
        /// Template id
        #[arg(short, long)]
        template: Option<String>,
    },
    /// List all resumes
    #[command(alias = "ls")]
    List,
    /// Show resume details
    Show {
        /// Resume ID (full or prefix)
        id: String,
    },
    /// Rename a resume
    Rename {
        /// Resume ID (full or prefix)
        id: String,
        /// New title
        title: String,
    },
    /// Copy a resume under a new id
    #[command(alias = "cp")]
    Duplicate {
        /// Resume ID (full or prefix)
        id: String,
    },
    /// Delete a resume
    #[command(alias = "rm")]
    Delete {
        /// Resume ID (full or prefix)
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Export a resume as JSON
    Export {
        /// Resume ID (full or prefix)
        id: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a resume from a JSON file
    Import {
        /// JSON file produced by `folio resume export`
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum StorageCommands {
    /// Show the active backend
    Status,
    /// Make another backend active
    Switch {
        /// local_storage, file_system, webdav or baidu_disk
        storage_type: StorageType,
        /// Directory for file_system storage
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },
    /// Copy all resumes from one backend to another
    Migrate {
        from: StorageType,
        to: StorageType,
    },
    /// Use a directory for file_system storage
    Pick {
        path: PathBuf,
    },
    /// Forget the stored file_system directory
    ClearHandle,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, log_file, storage.type, storage.directory)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli, &output).await;

    if let Err(ref e) = result {
        if let (Some(hint), false) = (error_hint(e), output.is_quiet()) {
            eprintln!("hint: {}", hint);
        }
    }

    result
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    // Config commands work without opening storage
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), output);
    }

    let config =
        Config::load_with_cli_override(cli.config.as_ref()).context("Failed to load configuration")?;
    init_logging(&config);

    let config_path = cli.config.clone().unwrap_or_else(Config::config_file_path);
    let mut store = Store::open_with_config(config, config_path).await?;

    match cli.command {
        Commands::Resume { command } => handle_resume_command(command, &mut store, output).await,
        Commands::Storage { command } => {
            handle_storage_command(command, &mut store, output).await
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_resume_command(
    command: ResumeCommands,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        ResumeCommands::Create { title, template } => {
            commands::resume::create(store, title, template, output).await
        }
        ResumeCommands::List => commands::resume::list(store, output).await,
        ResumeCommands::Show { id } => commands::resume::show(store, id, output).await,
        ResumeCommands::Rename { id, title } => {
            commands::resume::rename(store, id, title, output).await
        }
        ResumeCommands::Duplicate { id } => commands::resume::duplicate(store, id, output).await,
        ResumeCommands::Delete { id, yes } => {
            commands::resume::delete(store, id, yes, output).await
        }
        ResumeCommands::Export { id, output: path } => {
            commands::resume::export(store, id, path, output).await
        }
        ResumeCommands::Import { file } => commands::resume::import(store, file, output).await,
    }
}

async fn handle_storage_command(
    command: StorageCommands,
    store: &mut Store,
    output: &Output,
) -> Result<()> {
    match command {
        StorageCommands::Status => commands::storage::status(store, output).await,
        StorageCommands::Switch {
            storage_type,
            directory,
        } => commands::storage::switch(store, storage_type, directory, output).await,
        StorageCommands::Migrate { from, to } => {
            commands::storage::migrate(store, from, to, output).await
        }
        StorageCommands::Pick { path } => commands::storage::pick(store, path, output).await,
        StorageCommands::ClearHandle => commands::storage::clear_handle(store, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Recovery hint for the first storage error in the chain
fn error_hint(err: &anyhow::Error) -> Option<String> {
    let storage_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())?;
    let suggestion = storage_err.recovery_suggestion()?;
    if storage_err.is_recoverable() {
        Some(format!("{} Then run the command again.", suggestion))
    } else {
        Some(suggestion.to_string())
    }
}

/// Install a subscriber when FOLIO_LOG is set
///
/// Logs go to `log_file` when configured, stderr otherwise.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("FOLIO_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!("folio_core={},folio_cli={}", log_level, log_level));

    match &config.log_file {
        Some(log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();
            info!("Logging to {:?}", log_path);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
