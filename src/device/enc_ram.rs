//! Encrypted RAM-backed block device
//!
//! The store holds ciphertext only: writes encrypt on the way in, reads
//! decrypt on the way out, one AES block at a time so every sector stays
//! independently addressable. A device that sits unopened past its
//! invalidation delay has its media flagged changed; revalidating
//! acknowledges the flag and clears the store.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Block};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::config::EncRamConfig;
use super::error::{DeviceError, DeviceResult};
use super::BlockDevice;
use crate::sched::Sector;

/// Cipher granularity of the store, in bytes
pub const CIPHER_BLOCK: usize = 16;

/// RAM disk with at-rest AES-128 encryption.
#[derive(Debug)]
pub struct EncRamDisk {
    config: EncRamConfig,
    cipher: Aes128,
    /// Ciphertext, `nsectors * sector_size` bytes
    data: RwLock<Vec<u8>>,
    /// Open handles
    users: AtomicU32,
    /// Set when the media was invalidated while unopened
    media_change: AtomicBool,
    /// Bumped on every open; an armed invalidation only fires if the
    /// generation it captured is still current
    invalidate_gen: AtomicU64,
}

impl EncRamDisk {
    /// Create a zero-filled encrypted RAM disk.
    pub fn new(config: EncRamConfig) -> DeviceResult<Self> {
        if config.sector_size == 0 || config.sector_size % CIPHER_BLOCK != 0 {
            return Err(DeviceError::UnalignedSectorSize(config.sector_size));
        }
        let cipher = Aes128::new(&config.key.into());
        let data = RwLock::new(vec![0u8; config.capacity_bytes()]);
        debug!(
            nsectors = config.nsectors,
            sector_size = config.sector_size,
            "encrypted ram disk created"
        );
        Ok(Self {
            config,
            cipher,
            data,
            users: AtomicU32::new(0),
            media_change: AtomicBool::new(false),
            invalidate_gen: AtomicU64::new(0),
        })
    }

    /// Mark the device in use. Cancels any armed invalidation.
    pub fn open(&self) {
        self.invalidate_gen.fetch_add(1, Ordering::SeqCst);
        self.users.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop a user. The last release arms the deferred media invalidation.
    ///
    /// Must run inside a Tokio runtime; the invalidation timer is spawned
    /// on it.
    pub fn release(self: &Arc<Self>) {
        let prev = self.users.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "release without open");
        if prev == 1 {
            let armed = self.invalidate_gen.load(Ordering::SeqCst);
            let disk = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(disk.config.invalidate_delay).await;
                disk.invalidate(armed);
            });
        }
    }

    /// True when the media was invalidated since the last revalidate.
    pub fn media_changed(&self) -> bool {
        self.media_change.load(Ordering::SeqCst)
    }

    /// Acknowledge a media change and clear the store.
    pub fn revalidate(&self) {
        if self.media_change.swap(false, Ordering::SeqCst) {
            self.data.write().fill(0);
            debug!("media revalidated, store cleared");
        }
    }

    /// Open handle count.
    pub fn users(&self) -> u32 {
        self.users.load(Ordering::SeqCst)
    }

    /// Ciphertext of one sector, for inspection. Bypasses the cipher.
    pub fn raw_sector(&self, sector: Sector) -> DeviceResult<Vec<u8>> {
        if sector >= self.config.nsectors {
            return Err(DeviceError::OutOfRange {
                start: sector,
                sectors: 1,
                capacity: self.config.nsectors,
            });
        }
        let offset = sector as usize * self.config.sector_size;
        let data = self.data.read();
        Ok(data[offset..offset + self.config.sector_size].to_vec())
    }

    /// Timer body armed by the last release.
    fn invalidate(&self, armed: u64) {
        if self.users.load(Ordering::SeqCst) > 0
            || self.invalidate_gen.load(Ordering::SeqCst) != armed
        {
            warn!("invalidation fired while device back in use, ignored");
            return;
        }
        self.media_change.store(true, Ordering::SeqCst);
        debug!("media invalidated after idle period");
    }

    fn check_transfer(&self, start: Sector, len: usize) -> DeviceResult<()> {
        if len == 0 {
            return Err(DeviceError::ZeroLength);
        }
        let sector_size = self.config.sector_size;
        if len % sector_size != 0 {
            return Err(DeviceError::BufferSize { len, sector_size });
        }
        let sectors = (len / sector_size) as u64;
        let capacity = self.config.nsectors;
        if start.checked_add(sectors).map_or(true, |end| end > capacity) {
            warn!(start, sectors, capacity, "transfer beyond end of device");
            return Err(DeviceError::OutOfRange {
                start,
                sectors,
                capacity,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlockDevice for EncRamDisk {
    async fn read_sectors(&self, start: Sector, buf: &mut [u8]) -> DeviceResult<()> {
        self.check_transfer(start, buf.len())?;
        let offset = start as usize * self.config.sector_size;
        let data = self.data.read();
        for (i, chunk) in buf.chunks_exact_mut(CIPHER_BLOCK).enumerate() {
            let at = offset + i * CIPHER_BLOCK;
            let mut block = Block::clone_from_slice(&data[at..at + CIPHER_BLOCK]);
            self.cipher.decrypt_block(&mut block);
            chunk.copy_from_slice(&block);
        }
        Ok(())
    }

    async fn write_sectors(&self, start: Sector, data: &[u8]) -> DeviceResult<()> {
        self.check_transfer(start, data.len())?;
        let offset = start as usize * self.config.sector_size;
        let mut store = self.data.write();
        for (i, chunk) in data.chunks_exact(CIPHER_BLOCK).enumerate() {
            let at = offset + i * CIPHER_BLOCK;
            let mut block = Block::clone_from_slice(chunk);
            self.cipher.encrypt_block(&mut block);
            store[at..at + CIPHER_BLOCK].copy_from_slice(&block);
        }
        Ok(())
    }

    fn capacity_sectors(&self) -> u64 {
        self.config.nsectors
    }

    fn sector_size(&self) -> usize {
        self.config.sector_size
    }
}
