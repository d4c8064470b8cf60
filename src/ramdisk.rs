use log::{error, info, trace};

use crate::error::ErrorKind;
use crate::medium::{MediumBackend, MediumKind, MediumStatus};
use crate::storage::{Geometry, LbaId};

/// Fixed medium backed by a reserved memory region.
pub struct RamDisk<'a> {
    memory: &'a mut [u8],
    geometry: Geometry,
    dirty: bool,
}

impl<'a> RamDisk<'a> {
    /// Take ownership of `memory` and carve it into `block_size` blocks.
    ///
    /// The region is zeroed; a trailing partial block is left unused.
    pub fn new(memory: &'a mut [u8], block_size: usize) -> Result<Self, ErrorKind> {
        if !block_size.is_power_of_two() || block_size > memory.len() {
            error!(
                "Invalid ram disk block size: {} for region of {} bytes.",
                block_size,
                memory.len()
            );
            return Err(ErrorKind::Configuration);
        }
        let num_blocks = u32::try_from(memory.len() / block_size)
            .map_err(|_| ErrorKind::Configuration)?;

        info!(
            "RamDisk @ {:p}, size {}",
            memory.as_ptr(),
            memory.len()
        );
        memory.fill(0u8);

        Ok(RamDisk {
            memory,
            geometry: Geometry {
                block_size,
                num_blocks,
            },
            dirty: false,
        })
    }

    /// True if writes landed since the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl<'a> MediumBackend for RamDisk<'a> {
    fn kind(&self) -> MediumKind {
        MediumKind::FixedMemory
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn status(&self) -> MediumStatus {
        MediumStatus::Ready
    }

    fn read(&mut self, lba: LbaId, count: u32, data: &mut [u8]) -> Result<(), ErrorKind> {
        let num_bytes = self.geometry.check_range(lba, count, data.len())?;
        let start = self.geometry.offset_of(lba);
        trace!("ram disk rd lba: {} count: {}", lba.0, count);
        data[..num_bytes].copy_from_slice(&self.memory[start..start + num_bytes]);
        Ok(())
    }

    fn write(&mut self, lba: LbaId, count: u32, data: &[u8]) -> Result<(), ErrorKind> {
        let num_bytes = self.geometry.check_range(lba, count, data.len())?;
        let start = self.geometry.offset_of(lba);
        trace!("ram disk wr lba: {} count: {}", lba.0, count);
        self.memory[start..start + num_bytes].copy_from_slice(&data[..num_bytes]);
        if num_bytes > 0 {
            self.dirty = true;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ErrorKind> {
        // Memory has no write cache; committing only clears the dirty mark.
        trace!("ram disk flush dirty: {}", self.dirty);
        self.dirty = false;
        Ok(())
    }
}
