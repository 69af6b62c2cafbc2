//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/folio/config.toml)
//! 3. Environment variables (FOLIO_* prefix)
//!
//! Environment variables take precedence over config file values.
//!
//! The `[storage]` table records the selected backend and its settings,
//! so the next start-up resumes on the same backend.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::storage::StorageType;

/// Environment variable prefix
const ENV_PREFIX: &str = "FOLIO";

/// Keys accepted by [`Config::set_value`]
pub const CONFIG_KEYS: &[&str] = &["data_dir", "log_file", "storage.type", "storage.directory"];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local data (key-value file, stored handles)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Write logs here instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Selected backend plus backend-specific settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type", default)]
    pub storage_type: StorageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_system: Option<FileSystemConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdav: Option<WebDavConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baidu_disk: Option<BaiduDiskConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystemConfig {
    /// Directory offered by the picker when no handle is stored
    pub directory_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDavConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaiduDiskConfig {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StorageConfig {
    pub fn new(storage_type: StorageType) -> Self {
        Self {
            storage_type,
            ..Self::default()
        }
    }

    /// File system selection rooted at `path`
    pub fn file_system(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_type: StorageType::FileSystem,
            file_system: Some(FileSystemConfig {
                directory_path: path.into(),
            }),
            ..Self::default()
        }
    }

    pub fn directory_path(&self) -> Option<&Path> {
        self.file_system.as_ref().map(|fs| fs.directory_path.as_path())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file: None,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (FOLIO_DATA_DIR, FOLIO_STORAGE, FOLIO_DIRECTORY)
    /// 2. Config file (~/.config/folio/config.toml or FOLIO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from `--config` when given, otherwise the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // FOLIO_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // FOLIO_STORAGE
        if let Ok(val) = std::env::var(format!("{}_STORAGE", ENV_PREFIX)) {
            self.storage.storage_type = val
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}_STORAGE", ENV_PREFIX))?;
        }

        // FOLIO_DIRECTORY
        if let Ok(val) = std::env::var(format!("{}_DIRECTORY", ENV_PREFIX)) {
            self.storage.file_system = if val.is_empty() {
                None
            } else {
                Some(FileSystemConfig {
                    directory_path: PathBuf::from(val),
                })
            };
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Set a value by its dotted key, see [`CONFIG_KEYS`]
    ///
    /// An empty value or `none` clears optional settings.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let cleared = value.is_empty() || value == "none";
        match key {
            "data_dir" => {
                if cleared {
                    bail!("data_dir cannot be empty");
                }
                self.data_dir = PathBuf::from(value);
            }
            "log_file" => {
                self.log_file = if cleared { None } else { Some(value.into()) };
            }
            "storage.type" => {
                self.storage.storage_type = value.parse().map_err(anyhow::Error::msg)?;
            }
            "storage.directory" => {
                self.storage.file_system = if cleared {
                    None
                } else {
                    Some(FileSystemConfig {
                        directory_path: value.into(),
                    })
                };
            }
            _ => bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with FOLIO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio")
            .join("config.toml")
    }

    /// File backing the key-value store
    pub fn kv_store_path(&self) -> PathBuf {
        self.data_dir.join("local_storage.json")
    }

    /// File holding granted directory handles
    pub fn handle_store_path(&self) -> PathBuf {
        self.data_dir.join("handles.json")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("folio")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "FOLIO_CONFIG",
        "FOLIO_DATA_DIR",
        "FOLIO_STORAGE",
        "FOLIO_DIRECTORY",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.storage_type, StorageType::LocalStorage);
        assert!(config.log_file.is_none());
        assert!(config.data_dir.ends_with("folio"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.kv_store_path().ends_with("local_storage.json"));
        assert!(config.handle_store_path().ends_with("handles.json"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("FOLIO_DATA_DIR", "/tmp/folio-test");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/folio-test"));
    }

    #[test]
    fn test_env_override_storage() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("FOLIO_STORAGE", "file_system");
        env::set_var("FOLIO_DIRECTORY", "/srv/resumes");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.storage.storage_type, StorageType::FileSystem);
        assert_eq!(
            config.storage.directory_path(),
            Some(Path::new("/srv/resumes"))
        );

        // Empty string clears the directory
        env::set_var("FOLIO_DIRECTORY", "");
        config.apply_env_overrides().unwrap();
        assert!(config.storage.file_system.is_none());
    }

    #[test]
    fn test_env_override_rejects_unknown_storage() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("FOLIO_STORAGE", "floppy");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/folio"),
            log_file: Some(PathBuf::from("/tmp/folio.log")),
            storage: StorageConfig::file_system("/home/me/resumes"),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("type = \"file_system\""));
        assert!(toml_str.contains("directory_path"));
        assert!(!toml_str.contains("webdav"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"

            [storage]
            type = "webdav"

            [storage.webdav]
            endpoint = "https://dav.example.com/resumes"
            username = "me"
            password = "secret"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.storage.storage_type, StorageType::WebDav);
        let webdav = config.storage.webdav.unwrap();
        assert_eq!(webdav.endpoint, "https://dav.example.com/resumes");
    }

    #[test]
    fn test_missing_storage_table_uses_default_backend() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str("data_dir = \"/d\"").unwrap();
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        env::set_var("FOLIO_DATA_DIR", &data_dir);

        let config = Config::load_from_path(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config.storage.storage_type, StorageType::LocalStorage);
        assert!(data_dir.is_dir());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config {
            data_dir: temp_dir.path().join("data"),
            ..Config::default()
        };
        config.set_value("storage.type", "file_system").unwrap();
        config.set_value("storage.directory", "/docs").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();

        config.set_value("log_file", "/tmp/f.log").unwrap();
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/f.log")));
        config.set_value("log_file", "none").unwrap();
        assert!(config.log_file.is_none());

        assert!(config.set_value("storage.type", "ftp").is_err());
        assert!(config.set_value("data_dir", "").is_err());

        let err = config.set_value("sync_url", "x").unwrap_err();
        assert!(err.to_string().contains("Valid keys"));
    }
}
