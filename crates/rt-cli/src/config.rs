//! Configuration for the `dynrtctl` CLI.
//!
//! Settings here are defaults for the stress-test and demo subcommands;
//! every one of them can still be overridden on the command line.

use dirs::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "dynrtctl.toml";

/// Application configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Global verbose setting.
    #[serde(default)]
    pub verbose: bool,

    /// Allocator-related defaults.
    #[serde(default)]
    pub alloc: AllocConfig,

    /// Library-loader defaults.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Defaults for the `alloc-stress` subcommand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocConfig {
    /// Route every request straight to the system allocator, bypassing
    /// the bucket cache. Mirrors `RT_ALLOC_PURIFY`.
    #[serde(default)]
    pub purify_mode: bool,

    /// Number of allocate/free rounds per worker thread.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Number of worker threads.
    #[serde(default = "default_threads")]
    pub threads: u32,
}

/// Defaults for the `load`/`unload` subcommands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Directories searched for a library when only a bare file name is
    /// given on the command line.
    #[serde(default)]
    pub search_path: Vec<String>,
}

fn default_iterations() -> u32 {
    10_000
}

fn default_threads() -> u32 {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            alloc: AllocConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            purify_mode: false,
            iterations: default_iterations(),
            threads: default_threads(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_path: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Searches, in order, the current directory, the user's home
    /// directory, and the system configuration directory. Returns the
    /// default configuration if no config file is found in any of them.
    pub fn load() -> Result<Self> {
        match Self::find_config_file()? {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CliError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::Config(format!("failed to parse configuration: {e}")))
    }

    /// Save configuration to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| CliError::Config(format!("failed to serialize configuration: {e}")))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    fn check_current_dir_config() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    fn check_home_config() -> Option<PathBuf> {
        home_dir()
            .map(|dir| dir.join(".config").join("dynrtctl").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn check_system_config() -> Option<PathBuf> {
        config_dir()
            .map(|dir| dir.join("dynrtctl").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn find_config_file() -> Result<Option<PathBuf>> {
        Ok(Self::check_current_dir_config()
            .or_else(Self::check_home_config)
            .or_else(Self::check_system_config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.verbose);
        assert!(!config.alloc.purify_mode);
        assert_eq!(config.alloc.iterations, 10_000);
        assert_eq!(config.alloc.threads, 4);
        assert!(config.loader.search_path.is_empty());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut original = Config::default();
        original.alloc.purify_mode = true;
        original.loader.search_path.push("/usr/local/lib/dynrt".to_string());
        original.save_to_path(&config_path).unwrap();

        let loaded = Config::load_from_path(&config_path).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_load_from_nonexistent_path() {
        let result = Config::load_from_path(Path::new("/nonexistent/path/dynrtctl.toml"));
        assert!(result.is_err());
    }
}
