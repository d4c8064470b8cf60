use log::{error, trace, warn};

use crate::buffer::is_aligned;
use crate::card::CardDriver;
use crate::error::ErrorKind;
use crate::medium::{Medium, MediumBackend, MediumKind, MediumStatus};
use crate::storage::{Geometry, LbaId};

/// Per-unit transfer accounting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub failures: u32,
}

/// A binding attempt that did not produce a unit; hands its inputs back.
pub struct Unbound<'a, D: CardDriver> {
    pub kind: ErrorKind,
    pub medium: Medium<'a, D>,
    pub buffer: &'a mut [u8],
}

impl<'a, D: CardDriver> core::fmt::Debug for Unbound<'a, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Unbound")
            .field("kind", &self.kind)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

/// One host addressable volume.
///
/// A unit only exists fully bound: construction goes through [`LogicalUnit::bind`]
/// and the registry stores `Option<LogicalUnit>`, so a cleared slot is `None`.
pub struct LogicalUnit<'a, D: CardDriver> {
    medium: Medium<'a, D>,
    buffer: &'a mut [u8],
    read_only: bool,
    removable: bool,
    stats: TransferStats,
}

impl<'a, D: CardDriver> LogicalUnit<'a, D> {
    pub fn bind(
        medium: Medium<'a, D>,
        buffer: &'a mut [u8],
        read_only: bool,
    ) -> Result<Self, Unbound<'a, D>> {
        let block_size = medium.geometry().block_size;
        if buffer.is_empty() || block_size == 0 || buffer.len() % block_size != 0 {
            error!(
                "Unit buffer of {} bytes is not a multiple of block size {}",
                buffer.len(),
                block_size
            );
            return Err(Unbound {
                kind: ErrorKind::Configuration,
                medium,
                buffer,
            });
        }
        if !is_aligned(buffer) {
            warn!("Unit buffer @ {:p} is not cache aligned", buffer.as_ptr());
        }

        let removable = medium.kind() == MediumKind::RemovableCard;
        Ok(LogicalUnit {
            medium,
            buffer,
            read_only,
            removable,
            stats: TransferStats::default(),
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.medium.geometry()
    }

    pub fn status(&self) -> MediumStatus {
        self.medium.status()
    }

    pub fn kind(&self) -> MediumKind {
        self.medium.kind()
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of whole blocks the unit buffer stages per chunk.
    pub fn buffer_blocks(&self) -> u32 {
        (self.buffer.len() / self.geometry().block_size) as u32
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn medium(&self) -> &Medium<'a, D> {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut Medium<'a, D> {
        &mut self.medium
    }

    /// Tear down the binding, releasing the medium and buffer.
    pub fn into_parts(self) -> (Medium<'a, D>, &'a mut [u8]) {
        (self.medium, self.buffer)
    }

    pub fn flush(&mut self) -> Result<(), ErrorKind> {
        self.medium.flush()
    }

    /// Read `count` blocks at `lba` into `data`, staged through the unit buffer.
    pub fn read(&mut self, lba: LbaId, count: u32, data: &mut [u8]) -> Result<(), ErrorKind> {
        let geometry = self.geometry();
        let num_bytes = self.checked(geometry.check_range(lba, count, data.len()))?;
        trace!("lun rd lba: {} count: {}", lba.0, count);

        let chunk_blocks = self.buffer_blocks();
        let mut done = 0;
        while done < count {
            let blocks = core::cmp::min(chunk_blocks, count - done);
            let len = blocks as usize * geometry.block_size;
            let pos = done as usize * geometry.block_size;
            let res = self
                .medium
                .read(LbaId(lba.0 + done), blocks, &mut self.buffer[..len]);
            self.checked(res)?;
            data[pos..pos + len].copy_from_slice(&self.buffer[..len]);
            done += blocks;
        }

        self.stats.bytes_read += num_bytes as u64;
        Ok(())
    }

    /// Write `count` blocks at `lba` from `data`, staged through the unit buffer.
    pub fn write(&mut self, lba: LbaId, count: u32, data: &[u8]) -> Result<(), ErrorKind> {
        if self.read_only {
            warn!("lun wr lba: {} rejected, unit is read only", lba.0);
            self.stats.failures += 1;
            return Err(ErrorKind::WriteProtected);
        }
        let geometry = self.geometry();
        let num_bytes = self.checked(geometry.check_range(lba, count, data.len()))?;
        trace!("lun wr lba: {} count: {}", lba.0, count);

        let chunk_blocks = self.buffer_blocks();
        let mut done = 0;
        while done < count {
            let blocks = core::cmp::min(chunk_blocks, count - done);
            let len = blocks as usize * geometry.block_size;
            let pos = done as usize * geometry.block_size;
            self.buffer[..len].copy_from_slice(&data[pos..pos + len]);
            let res = self
                .medium
                .write(LbaId(lba.0 + done), blocks, &self.buffer[..len]);
            self.checked(res)?;
            done += blocks;
        }

        self.stats.bytes_written += num_bytes as u64;
        Ok(())
    }

    fn checked<T>(&mut self, res: Result<T, ErrorKind>) -> Result<T, ErrorKind> {
        if let Err(e) = &res {
            self.stats.failures += 1;
            match e {
                ErrorKind::OutOfBounds => error!("lun transfer out of bounds"),
                _ => warn!("lun transfer failed: {:?}", e),
            }
        }
        res
    }
}
