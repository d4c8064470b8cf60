#![cfg_attr(not(test), no_std)]

//! Logical unit registry and media layer for a USB mass storage device.
//!
//! A fixed RAM disk and any number of removable cards are bound to logical
//! units with dedicated transfer buffers. The [`ServiceLoop`] hands those units
//! to the host transport and commits buffered state once enough data has been
//! written between refresh ticks.

pub mod buffer;
pub mod card;
pub mod enumerate;
pub mod error;
pub mod flush;
pub mod lun;
pub mod medium;
pub mod ramdisk;
pub mod registry;
pub mod service;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod tests_util;

pub use buffer::{BufferPool, IoBuffer};
pub use card::{CardDriver, CardId, CardInfo, CardMedium};
pub use enumerate::{Enumerator, SlotState};
pub use error::ErrorKind;
pub use flush::{FlushDecision, FlushPolicy, RefreshSignal};
pub use lun::{LogicalUnit, TransferStats, Unbound};
pub use medium::{Medium, MediumBackend, MediumKind, MediumStatus};
pub use ramdisk::RamDisk;
pub use registry::Registry;
pub use service::ServiceLoop;
pub use storage::{Geometry, LbaId};
pub use transport::{Direction, TransferObserver, Transport};

/// Size of one block in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Size of each unit's transfer buffer, the more the better.
pub const IO_BUFFER_SIZE: usize = 128 * BLOCK_SIZE;

/// RAM disk size; hosts refuse to format much below 20 KiB.
pub const RAMDISK_SIZE: usize = 8 * 1024 * 1024;

pub const MAX_CARD_SLOTS: usize = 2;

pub const MAX_UNITS: usize = MAX_CARD_SLOTS + 1;

/// Write volume between refresh ticks at which buffered state is committed.
pub const FLUSH_THRESHOLD: u64 = 50_000;

/// Cache line size the transfer buffers are aligned to.
pub const BUFFER_ALIGN: usize = 32;

/// Run time tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Block size of the fixed medium.
    pub block_size: usize,
    pub flush_threshold: u64,
    /// Expose the fixed medium read only.
    pub fixed_read_only: bool,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            block_size: BLOCK_SIZE,
            flush_threshold: FLUSH_THRESHOLD,
            fixed_read_only: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_buffer_sizes() {
        assert_eq!(IO_BUFFER_SIZE % BLOCK_SIZE, 0);
        assert_eq!(RAMDISK_SIZE % BLOCK_SIZE, 0);
        assert_eq!(core::mem::align_of::<IoBuffer<IO_BUFFER_SIZE>>(), BUFFER_ALIGN);
    }
}
