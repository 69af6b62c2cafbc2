//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use folio_core::Config;

use crate::output::{Output, OutputFormat};

fn or_unset(value: Option<String>) -> String {
    value.unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "log_file": config.log_file,
                    "storage": {
                        "type": config.storage.storage_type,
                        "directory": config.storage.directory_path(),
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:          {}", config.data_dir.display());
            println!(
                "  log_file:          {}",
                or_unset(config.log_file.as_ref().map(|p| p.display().to_string()))
            );
            println!("  storage.type:      {}", config.storage.storage_type.as_str());
            println!(
                "  storage.directory: {}",
                or_unset(
                    config
                        .storage
                        .directory_path()
                        .map(|p| p.display().to_string())
                )
            );
            if config.storage.webdav.is_some() {
                println!("  storage.webdav:    (configured)");
            }
            if config.storage.baidu_disk.is_some() {
                println!("  storage.baidu_disk: (configured)");
            }
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set_value(&key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
