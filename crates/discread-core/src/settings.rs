//! Persistent user settings for discread
//!
//! Settings are stored in a TOML configuration file at:
//! - Linux/macOS: `~/.config/discread/discread_config.toml`
//! - Windows: `%APPDATA%\discread\discread_config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [reader]
//! timeout_secs = 15
//! start_blocks = 64
//! raw = false
//!
//! [output]
//! json = false
//! hex_width = 16
//! ```

use crate::config::{ReaderConfig, DEFAULT_TIMEOUT};
use crate::transfer::DEFAULT_START_BLOCKS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration file name
const CONFIG_FILE_NAME: &str = "discread_config.toml";

/// Application name for config directory
const APP_NAME: &str = "discread";

/// Default bytes per hex dump line
pub const DEFAULT_HEX_WIDTH: usize = 16;

/// User settings loaded from configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Reader negotiation settings
    pub reader: ReaderSettings,

    /// Output settings
    pub output: OutputSettings,
}

/// Settings for reader sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReaderSettings {
    /// Per-command timeout in seconds
    pub timeout_secs: u64,

    /// Blocks per transfer to start negotiating from
    pub start_blocks: u32,

    /// Use raw sector reads when available
    pub raw: bool,
}

/// Settings for printed output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// Print JSON instead of text by default
    pub json: bool,

    /// Bytes per hex dump line
    pub hex_width: usize,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            start_blocks: DEFAULT_START_BLOCKS,
            raw: false,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            json: false,
            hex_width: DEFAULT_HEX_WIDTH,
        }
    }
}

impl ReaderSettings {
    /// Reader configuration from these settings
    pub fn to_config(&self) -> ReaderConfig {
        ReaderConfig::new()
            .timeout(Duration::from_secs(self.timeout_secs))
            .start_blocks(self.start_blocks)
            .raw(self.raw)
    }
}

impl Settings {
    /// Load settings from the configuration file
    ///
    /// Returns default settings if the file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config path available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::try_load(&path) {
            Ok(settings) => {
                tracing::debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Load settings, reporting why the file could not be used
    pub fn try_load(path: &std::path::Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(SettingsError::Deserialize)
    }

    /// Save settings to the configuration file
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        self.save_to_path(Self::config_path())
    }

    /// Save settings to a specific path
    pub fn save_to_path(&self, path: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
        let path = path.ok_or(SettingsError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        std::fs::write(&path, contents).map_err(|e| SettingsError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Check if a configuration file exists
    pub fn config_exists() -> bool {
        Self::config_path().is_some_and(|p| p.exists())
    }

    /// Generate a default configuration file content as a string
    pub fn default_config_string() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate default config"))
    }

    /// Reader configuration from these settings
    pub fn reader_config(&self) -> ReaderConfig {
        self.reader.to_config()
    }
}

/// Errors that can occur when working with settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No configuration directory available
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// Failed to read or write config file
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path that caused the error
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Failed to serialize settings
    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),

    /// Failed to deserialize settings
    #[error("Failed to parse settings: {0}")]
    Deserialize(toml::de::Error),
}
