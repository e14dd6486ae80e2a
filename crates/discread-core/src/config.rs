//! Configuration for a reader session

use crate::error::{Error, Result};
use crate::transfer::DEFAULT_START_BLOCKS;
use std::time::Duration;

/// Default per-command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Reader configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Timeout passed to the transport with every command
    pub timeout: Duration,

    /// Blocks per transfer to start negotiating from
    pub start_blocks: u32,

    /// Look for and use a raw (long) sector path
    pub raw: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            start_blocks: DEFAULT_START_BLOCKS,
            raw: false,
        }
    }
}

impl ReaderConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-command timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the starting transfer length
    pub fn start_blocks(mut self, blocks: u32) -> Self {
        self.start_blocks = blocks;
        self
    }

    /// Request raw sector reads
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Reject settings the reader cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be non-zero".to_string()));
        }
        if self.start_blocks == 0 {
            return Err(Error::InvalidConfig(
                "start blocks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ReaderConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.start_blocks, 64);
        assert!(!config.raw);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ReaderConfig::new()
            .timeout(Duration::from_secs(3))
            .start_blocks(128)
            .raw(true);

        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.start_blocks, 128);
        assert!(config.raw);
    }

    #[test]
    fn test_config_validation() {
        let err = ReaderConfig::new().timeout(Duration::ZERO).validate().unwrap_err();
        assert!(err.to_string().contains("timeout"));

        let err = ReaderConfig::new().start_blocks(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
