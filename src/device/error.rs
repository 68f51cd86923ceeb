//! Device error types

use thiserror::Error;

use crate::sched::Sector;

/// Block device and queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Transfer extends past the end of the device
    #[error("sector range {start}+{sectors} exceeds capacity {capacity}")]
    OutOfRange {
        start: Sector,
        sectors: u64,
        capacity: u64,
    },

    /// Buffer length is not a whole number of sectors
    #[error("buffer of {len} bytes is not a multiple of the {sector_size}-byte sector")]
    BufferSize { len: usize, sector_size: usize },

    /// Zero-length transfers carry no sector range to schedule
    #[error("zero-length transfer")]
    ZeroLength,

    /// Sector size the cipher cannot cover evenly
    #[error("sector size {0} is not a multiple of the cipher block")]
    UnalignedSectorSize(usize),

    /// The queue stopped before the request reached the device
    #[error("request queue shut down")]
    Shutdown,
}

pub type DeviceResult<T> = Result<T, DeviceError>;
