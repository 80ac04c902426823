use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::orchestrator::ImportOptions;

/// Configuration for encore.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (ENCORE_* prefix)
/// 3. Config file (~/.config/encore/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: ENCORE_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/encore/encore.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// GitHub repository (`owner/name`) publishing data releases.
    #[serde(default = "default_release_repository")]
    pub release_repository: String,

    /// Base URL of the releases API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Name prefix of the data archive asset.
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,

    /// Name suffix of the data archive asset.
    #[serde(default = "default_asset_suffix")]
    pub asset_suffix: String,

    /// Rows written per store flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Parent directory for per-run scratch space. Defaults to the system
    /// temp directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            release_repository: default_release_repository(),
            api_base_url: default_api_base_url(),
            asset_prefix: default_asset_prefix(),
            asset_suffix: default_asset_suffix(),
            batch_size: default_batch_size(),
            work_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/encore/config.toml
    /// Reads environment variables with ENCORE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("encore");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration, overriding the database path when the --db flag
    /// is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_with_db_path(db_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load()?;
        if let Some(path) = db_path {
            config.database_path = path;
        }
        Ok(config)
    }

    /// Pipeline settings derived from this configuration.
    #[must_use]
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            batch_size: self.batch_size.max(1),
            asset_prefix: self.asset_prefix.clone(),
            asset_suffix: self.asset_suffix.clone(),
            work_dir: self.work_dir.clone(),
            ..ImportOptions::default()
        }
    }
}

/// Returns: ~/.local/share/encore/encore.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
        .join("encore.db")
}

fn default_release_repository() -> String {
    "encore-app/encore-data".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_asset_prefix() -> String {
    "data".to_string()
}

fn default_asset_suffix() -> String {
    ".zip".to_string()
}

const fn default_batch_size() -> usize {
    500
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/encore/config.toml
/// - macOS: ~/Library/Application Support/encore/config.toml
/// - Windows: %APPDATA%\encore\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Encore Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (ENCORE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Path to the SQLite database
#
# Can also be set via:
# - CLI: encore --db /custom/path.db import
# - Environment: ENCORE_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/encore.db"

# GitHub repository publishing the data archive releases
#release_repository = "encore-app/encore-data"
#api_base_url = "https://api.github.com"

# The data archive is the first release asset named <prefix>...<suffix>
#asset_prefix = "data"
#asset_suffix = ".zip"

# Rows written to the database per transaction during import
#batch_size = 500

# Scratch space for the downloaded and extracted archive
# Default: the system temp directory
#work_dir = "/var/tmp/encore"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.database_path.as_os_str().is_empty());
        assert_eq!(config.release_repository, "encore-app/encore-data");
        assert_eq!(config.batch_size, 500);
        assert!(config.work_dir.is_none());
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_with_custom_db_path() {
        let custom_path = PathBuf::from("/tmp/test.db");
        let config = Config::load_with_db_path(Some(custom_path.clone()));
        assert!(config.is_ok());
        assert_eq!(config.unwrap().database_path, custom_path);
    }

    #[test]
    fn test_import_options_projection() {
        let config = Config {
            batch_size: 0,
            asset_prefix: "catalog".to_string(),
            work_dir: Some(PathBuf::from("/var/tmp/encore")),
            ..Config::default()
        };
        let options = config.import_options();
        assert_eq!(options.batch_size, 1);
        assert_eq!(options.asset_prefix, "catalog");
        assert_eq!(options.asset_suffix, ".zip");
        assert_eq!(options.work_dir, Some(PathBuf::from("/var/tmp/encore")));
    }

    #[test]
    fn test_example_config_mentions_every_key() {
        let example = example_config();
        for key in [
            "database_path",
            "release_repository",
            "api_base_url",
            "asset_prefix",
            "asset_suffix",
            "batch_size",
            "work_dir",
        ] {
            assert!(example.contains(key), "missing {key}");
        }
    }
}
