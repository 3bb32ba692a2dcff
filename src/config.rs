// Host configuration - RON file under the user config directory

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIR: &str = "synthchain";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File backing the key-value store
    pub store_path: PathBuf,
    /// Directory holding reverb impulse responses
    pub impulse_dir: PathBuf,
    pub midi_enabled: bool,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    pub tick_interval_ms: u64,
    pub midi_buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            store_path: data.join("store.json"),
            impulse_dir: data.join("impulses"),
            midi_enabled: true,
            log_level: "info".to_string(),
            tick_interval_ms: 1,
            midi_buffer_capacity: 512,
        }
    }
}

impl Config {
    /// `<config_dir>/synthchain/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.ron"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file or the config directory is missing
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = ron::ser::to_string_pretty(self, PrettyConfig::default())?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.ron")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.midi_enabled);
        assert_eq!(config.midi_buffer_capacity, 512);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let config = Config {
            midi_enabled: false,
            log_level: "debug".to_string(),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ron");
        fs::write(&path, "(tick_interval_ms: 5)").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.tick_interval_ms, 5);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ron");
        fs::write(&path, "(tick_interval_ms: \"soon\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
