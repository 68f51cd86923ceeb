//! Block device boundary
//!
//! The queue adapter drives anything implementing [`BlockDevice`]. The
//! in-tree backend is [`EncRamDisk`], a RAM-backed device whose store holds
//! ciphertext only.

pub mod config;
pub mod enc_ram;
pub mod error;

pub use config::{EncRamConfig, DEFAULT_INVALIDATE_DELAY, DEFAULT_KEY, DEFAULT_NSECTORS};
pub use enc_ram::EncRamDisk;
pub use error::{DeviceError, DeviceResult};

use async_trait::async_trait;

use crate::sched::Sector;

/// Default sector size in bytes
pub const SECTOR_SIZE: usize = 512;

/// Sector-addressed block device.
///
/// Transfers are whole sectors; buffers must be a multiple of
/// [`sector_size`](BlockDevice::sector_size) bytes.
#[async_trait]
pub trait BlockDevice: Send + Sync {
    /// Read `buf.len() / sector_size()` sectors starting at `start`.
    async fn read_sectors(&self, start: Sector, buf: &mut [u8]) -> DeviceResult<()>;

    /// Write `data` starting at sector `start`.
    async fn write_sectors(&self, start: Sector, data: &[u8]) -> DeviceResult<()>;

    /// Device capacity in sectors.
    fn capacity_sectors(&self) -> u64;

    /// Hardware sector size in bytes.
    fn sector_size(&self) -> usize {
        SECTOR_SIZE
    }
}
