use crate::error::ErrorKind;

/// Index of a block on a medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LbaId(pub u32);

/// Shape of a block store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: usize,
    pub num_blocks: u32,
}

impl Geometry {
    pub fn capacity_bytes(&self) -> u64 {
        self.block_size as u64 * self.num_blocks as u64
    }

    /// Validate a `count` block transfer at `lba` using a buffer of `buf_len` bytes.
    ///
    /// Returns the number of bytes the transfer covers.
    pub fn check_range(&self, lba: LbaId, count: u32, buf_len: usize) -> Result<usize, ErrorKind> {
        let end = lba.0.checked_add(count).ok_or(ErrorKind::OutOfBounds)?;
        if end > self.num_blocks {
            return Err(ErrorKind::OutOfBounds);
        }
        let num_bytes = (count as usize)
            .checked_mul(self.block_size)
            .ok_or(ErrorKind::OutOfBounds)?;
        if buf_len < num_bytes {
            return Err(ErrorKind::OutOfBounds);
        }
        Ok(num_bytes)
    }

    pub(crate) fn offset_of(&self, lba: LbaId) -> usize {
        lba.0 as usize * self.block_size
    }
}
