//! CLI command implementations

pub mod config;
pub mod probe;
pub mod read;

use anyhow::{Context, Result};
use discread_core::{DeviceProfile, ReaderConfig, Settings, SimulatedDevice};
use humansize::{format_size as humanize, BINARY};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reader options given on the command line, layered over the settings file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Look for a raw sector path
    pub raw: bool,
    /// Starting transfer length
    pub start_blocks: Option<u32>,
    /// Per-command timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Overrides {
    /// Effective reader configuration
    pub fn apply(&self, settings: &Settings) -> ReaderConfig {
        let mut config = settings.reader_config().raw(self.raw || settings.reader.raw);
        if let Some(blocks) = self.start_blocks {
            config = config.start_blocks(blocks);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Settings from `path`, or from the default location
pub fn load_settings(path: Option<PathBuf>) -> Settings {
    match path {
        Some(path) => Settings::load_from_path(Some(path)),
        None => Settings::load(),
    }
}

/// Build the simulated device described by a profile file
pub fn open_device(profile: &Path) -> Result<SimulatedDevice> {
    let profile = DeviceProfile::load(profile)
        .with_context(|| format!("Failed to load device profile: {}", profile.display()))?;
    SimulatedDevice::from_profile(&profile).context("Failed to create simulated device")
}

/// Format a byte count for display
pub fn format_size(bytes: u64) -> String {
    humanize(bytes, BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_default_uses_settings() {
        let settings = Settings::default();
        assert_eq!(Overrides::default().apply(&settings), ReaderConfig::default());
    }

    #[test]
    fn test_overrides_replace_settings() {
        let overrides = Overrides {
            raw: true,
            start_blocks: Some(8),
            timeout_secs: Some(2),
        };
        let config = overrides.apply(&Settings::default());
        assert!(config.raw);
        assert_eq!(config.start_blocks, 8);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_raw_from_settings() {
        let mut settings = Settings::default();
        settings.reader.raw = true;
        assert!(Overrides::default().apply(&settings).raw);
    }

    #[test]
    fn test_open_device_missing_profile() {
        let err = open_device(Path::new("/nonexistent/profile.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to load device profile"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1024), "1 KiB");
        assert_eq!(format_size(1024 * 1024), "1 MiB");
    }
}
