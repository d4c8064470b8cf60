use log::trace;

use crate::BUFFER_ALIGN;

/// Transfer buffer aligned for the bulk endpoint DMA.
#[repr(C, align(32))]
pub struct IoBuffer<const SIZE: usize>(pub [u8; SIZE]);

impl<const SIZE: usize> IoBuffer<SIZE> {
    pub const fn new() -> Self {
        IoBuffer([0u8; SIZE])
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}

impl<const SIZE: usize> Default for IoBuffer<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn is_aligned(buffer: &[u8]) -> bool {
    buffer.as_ptr() as usize % BUFFER_ALIGN == 0
}

/// Pre-reserved set of unit buffers handed out during enumeration.
pub struct BufferPool<'a, const B: usize> {
    buffers: [Option<&'a mut [u8]>; B],
}

impl<'a, const B: usize> BufferPool<'a, B> {
    pub fn new(buffers: [&'a mut [u8]; B]) -> Self {
        let mut buffers = buffers.map(Some);
        // Hand out in declaration order.
        buffers.reverse();
        BufferPool { buffers }
    }

    /// Take the next free buffer, if one is left.
    pub fn take(&mut self) -> Option<&'a mut [u8]> {
        let buffer = self.buffers.iter_mut().rev().find_map(|b| b.take());
        trace!("buffer pool take: {} left", self.available());
        buffer
    }

    /// Return a buffer released by an evicted unit.
    pub fn give_back(&mut self, buffer: &'a mut [u8]) {
        if let Some(slot) = self.buffers.iter_mut().find(|b| b.is_none()) {
            *slot = Some(buffer);
        }
        trace!("buffer pool give back: {} left", self.available());
    }

    pub fn available(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }
}
