//! Fixed-capacity stream buffers.
//!
//! A handle carries one buffer per direction. The write side accumulates
//! bytes that are pending a flush; the read side holds whatever the last
//! refill pulled from the descriptor.
//!
//! Design: both buffers are allocated once, fallibly, at open time and never
//! grow. Positions are offsets into the buffer relative to the descriptor
//! cursor at the last refill/flush, never absolute file offsets.

use crate::error::{Error, Result};

/// Allocate a zeroed byte region without aborting on allocation failure.
fn alloc_zeroed(capacity: usize) -> Result<Box<[u8]>> {
    let mut data = Vec::new();
    data.try_reserve_exact(capacity)
        .map_err(|_| Error::Allocation { bytes: capacity })?;
    data.resize(capacity, 0);
    Ok(data.into_boxed_slice())
}

// ---------------------------------------------------------------------------
// Write side
// ---------------------------------------------------------------------------

/// Pending-write buffer.
///
/// Invariant: `pos <= data.len()`.
#[derive(Debug)]
pub struct WriteBuffer {
    data: Box<[u8]>,
    /// Number of bytes buffered and not yet flushed.
    pos: usize,
}

impl WriteBuffer {
    /// Allocate a write buffer of `capacity` bytes (at least one).
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            data: alloc_zeroed(capacity.max(1))?,
            pos: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently pending.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub fn is_full(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Free space left before the buffer must be flushed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Copy as much of `data` as fits. Returns the number of bytes taken.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let take = data.len().min(self.remaining());
        self.data[self.pos..self.pos + take].copy_from_slice(&data[..take]);
        self.pos += take;
        take
    }

    /// Bytes waiting to be flushed, in write order.
    pub fn pending(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    /// Mark the pending bytes as committed.
    pub fn mark_flushed(&mut self) {
        self.pos = 0;
    }
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// Refill buffer.
///
/// Invariant: `pos <= filled <= data.len()`.
#[derive(Debug)]
pub struct ReadBuffer {
    data: Box<[u8]>,
    /// Next unread offset.
    pos: usize,
    /// Valid bytes loaded by the last refill.
    filled: usize,
}

impl ReadBuffer {
    /// Allocate a read buffer of `capacity` bytes (at least one).
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            data: alloc_zeroed(capacity.max(1))?,
            pos: 0,
            filled: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Loaded bytes not yet handed to a caller.
    pub fn readable(&self) -> usize {
        self.filled - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.readable() == 0
    }

    /// Copy unread bytes into `dst`. Returns the number copied.
    pub fn take_into(&mut self, dst: &mut [u8]) -> usize {
        let take = dst.len().min(self.readable());
        dst[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        take
    }

    /// The whole backing region, ready to be filled from the descriptor.
    ///
    /// Any unread bytes are discarded. Call [`ReadBuffer::set_filled`] with the
    /// number of bytes actually loaded.
    pub fn refill_slot(&mut self) -> &mut [u8] {
        self.pos = 0;
        self.filled = 0;
        &mut self.data
    }

    /// Record a refill of `n` bytes.
    pub fn set_filled(&mut self, n: usize) {
        debug_assert!(n <= self.data.len());
        self.filled = n.min(self.data.len());
        self.pos = 0;
    }

    /// Drop all loaded bytes.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_write_buffer_absorbs_small_writes() {
        let mut buf = WriteBuffer::new(64).unwrap();
        assert_eq!(buf.push(b"hello"), 5);
        assert_eq!(buf.pending(), b"hello");
        assert!(!buf.is_full());
        assert_eq!(buf.remaining(), 59);
    }

    #[test]
    fn test_write_buffer_takes_only_what_fits() {
        let mut buf = WriteBuffer::new(4).unwrap();
        assert_eq!(buf.push(b"abcdef"), 4);
        assert!(buf.is_full());
        assert_eq!(buf.pending(), b"abcd");
        assert_eq!(buf.push(b"x"), 0);
    }

    #[test]
    fn test_write_buffer_mark_flushed_resets() {
        let mut buf = WriteBuffer::new(4).unwrap();
        buf.push(b"ab");
        buf.mark_flushed();
        assert!(buf.is_empty());
        assert_eq!(buf.pending(), b"");
        assert_eq!(buf.remaining(), 4);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(WriteBuffer::new(0).unwrap().capacity(), 1);
        assert_eq!(ReadBuffer::new(0).unwrap().capacity(), 1);
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let err = WriteBuffer::new(usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocationFailure);
        let err = ReadBuffer::new(usize::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocationFailure);
    }

    #[test]
    fn test_read_from_filled_buffer() {
        let mut buf = ReadBuffer::new(16).unwrap();
        let slot = buf.refill_slot();
        slot[..11].copy_from_slice(b"hello world");
        buf.set_filled(11);

        let mut out = [0u8; 5];
        assert_eq!(buf.take_into(&mut out), 5);
        assert_eq!(&out, b"hello");
        assert_eq!(buf.readable(), 6);

        let mut rest = [0u8; 32];
        assert_eq!(buf.take_into(&mut rest), 6);
        assert_eq!(&rest[..6], b" world");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_refill_slot_discards_unread() {
        let mut buf = ReadBuffer::new(8).unwrap();
        buf.refill_slot()[..3].copy_from_slice(b"abc");
        buf.set_filled(3);
        assert_eq!(buf.refill_slot().len(), 8);
        assert_eq!(buf.readable(), 0);
    }

    #[test]
    fn test_reset_drops_loaded_bytes() {
        let mut buf = ReadBuffer::new(8).unwrap();
        buf.refill_slot()[..2].copy_from_slice(b"xy");
        buf.set_filled(2);
        buf.reset();
        assert!(buf.is_empty());
        let mut out = [0u8; 2];
        assert_eq!(buf.take_into(&mut out), 0);
    }
}
