//! Encrypted RAM disk configuration

use std::time::Duration;

use super::SECTOR_SIZE;

/// Default device size in sectors
pub const DEFAULT_NSECTORS: u64 = 1024;

/// Default delay before an unopened device's media is invalidated
pub const DEFAULT_INVALIDATE_DELAY: Duration = Duration::from_secs(30);

/// Cipher key used when the host configures none. Key management is the
/// host's concern; this keeps throwaway devices usable out of the box.
pub const DEFAULT_KEY: [u8; 16] = *b"1537926480\0\0\0\0\0\0";

/// Configuration for an encrypted RAM disk
#[derive(Debug, Clone)]
pub struct EncRamConfig {
    /// Device size in sectors
    pub nsectors: u64,
    /// Hardware sector size in bytes; must be a multiple of the cipher block
    pub sector_size: usize,
    /// AES-128 key for the at-rest encryption
    pub key: [u8; 16],
    /// How long a device may sit unopened before its media is invalidated
    pub invalidate_delay: Duration,
}

impl Default for EncRamConfig {
    fn default() -> Self {
        Self {
            nsectors: DEFAULT_NSECTORS,
            sector_size: SECTOR_SIZE,
            key: DEFAULT_KEY,
            invalidate_delay: DEFAULT_INVALIDATE_DELAY,
        }
    }
}

impl EncRamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device size in sectors
    pub fn with_nsectors(mut self, nsectors: u64) -> Self {
        self.nsectors = nsectors;
        self
    }

    /// Set the hardware sector size in bytes
    pub fn with_sector_size(mut self, sector_size: usize) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// Set the cipher key
    pub fn with_key(mut self, key: [u8; 16]) -> Self {
        self.key = key;
        self
    }

    /// Set the media invalidation delay
    pub fn with_invalidate_delay(mut self, delay: Duration) -> Self {
        self.invalidate_delay = delay;
        self
    }

    /// Device capacity in bytes
    pub fn capacity_bytes(&self) -> usize {
        self.nsectors as usize * self.sector_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EncRamConfig::default();
        assert_eq!(config.nsectors, 1024);
        assert_eq!(config.sector_size, 512);
        assert_eq!(config.capacity_bytes(), 512 * 1024);
        assert_eq!(&config.key[..10], b"1537926480");
    }

    #[test]
    fn test_builder() {
        let config = EncRamConfig::new()
            .with_nsectors(64)
            .with_sector_size(1024)
            .with_invalidate_delay(Duration::from_millis(5));
        assert_eq!(config.nsectors, 64);
        assert_eq!(config.sector_size, 1024);
        assert_eq!(config.capacity_bytes(), 64 * 1024);
    }
}
