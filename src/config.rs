//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub etl: EtlConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Input tree locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_song_dir")]
    pub song_dir: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// ETL behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Skip files that fail instead of aborting the run. Off by default:
    /// fail-fast leaves already-committed files intact and the operator
    /// re-runs after fixing the input.
    #[serde(default)]
    pub continue_on_error: bool,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/playlog/playlog.db".to_string()
}

fn default_song_dir() -> String {
    "data/song_data".to_string()
}

fn default_log_dir() -> String {
    "data/log_data".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            song_dir: default_song_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            data: DataConfig::default(),
            etl: EtlConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./playlog.yaml (current directory)
    /// 3. ~/.config/playlog/playlog.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "playlog.yaml".to_string(),
            shellexpand::tilde("~/.config/playlog/playlog.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    pub fn song_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data.song_dir).to_string())
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data.log_dir).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.etl.continue_on_error);
        assert_eq!(config.data.song_dir, "data/song_data");
        assert_eq!(config.data.log_dir, "data/log_data");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: ~/.local/share/playlog/test.db

data:
  song_dir: /srv/etl/song_data
  log_dir: /srv/etl/log_data

etl:
  continue_on_error: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.path, "~/.local/share/playlog/test.db");
        assert_eq!(config.song_dir(), PathBuf::from("/srv/etl/song_data"));
        assert!(config.etl.continue_on_error);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "database:\n  path: /tmp/playlog.db\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.data.log_dir, "data/log_data");
        assert!(!config.etl.continue_on_error);
    }
}
