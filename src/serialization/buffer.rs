//! An owned output buffer that grows by doubling.
//!
//! The compressor writes into the unused tail of the buffer (`spare_mut`) and reports how much it
//! wrote (`advance`). When the tail is used up the buffer doubles, keeping the bytes already
//! written. Growth uses fallible allocation so running out of memory surfaces as an error instead
//! of an abort.

use std::collections::TryReserveError;

/// A byte buffer with a filled prefix and a zeroed, writable tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    // buf.len() is the capacity handed out to writers; `len` is how much of it is filled
    buf: Vec<u8>,
    len: usize,
}

impl OutputBuffer {
    /// Create a buffer with `capacity` writable bytes.
    pub fn with_capacity(capacity: usize) -> Result<OutputBuffer, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)?;
        buf.resize(capacity, 0);
        Ok(OutputBuffer { buf, len: 0 })
    }

    /// Number of filled bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total writable size, filled or not.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// True if there is no spare room left.
    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Double the capacity, preserving the filled bytes.
    pub fn grow(&mut self) -> Result<(), TryReserveError> {
        let new_capacity = self.buf.len().max(1).saturating_mul(2);
        self.ensure_capacity(new_capacity)
    }

    /// Make sure at least `capacity` bytes are writable, doubling as many times as needed.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<(), TryReserveError> {
        if capacity <= self.buf.len() {
            return Ok(());
        }

        let mut new_capacity = self.buf.len().max(1);
        while new_capacity < capacity {
            new_capacity = new_capacity.saturating_mul(2);
        }

        self.buf.try_reserve_exact(new_capacity - self.buf.len())?;
        self.buf.resize(new_capacity, 0);
        Ok(())
    }

    /// Append `bytes` after the filled prefix, growing if needed.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), TryReserveError> {
        let end = self.len + bytes.len();
        self.ensure_capacity(end)?;
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    /// The writable tail after the filled prefix.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Mark `n` more bytes of the tail as filled.
    ///
    /// Panics if that would go past the capacity.
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.buf.len() - self.len, "advanced past capacity");
        self.len += n;
    }

    /// The filled bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The filled bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// Take the filled bytes, dropping the unused tail.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.truncate(self.len);
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_with_requested_capacity() {
        let b = OutputBuffer::with_capacity(16).unwrap();
        assert_eq!(0, b.len());
        assert_eq!(16, b.capacity());
        assert!(b.is_empty());
        assert!(!b.is_full());
    }

    #[test]
    fn grow_doubles_and_keeps_contents() {
        let mut b = OutputBuffer::with_capacity(4).unwrap();
        b.append(&[1, 2, 3, 4]).unwrap();
        assert!(b.is_full());

        b.grow().unwrap();
        assert_eq!(8, b.capacity());
        assert_eq!(&[1, 2, 3, 4], b.as_slice());
        assert_eq!(4, b.spare_mut().len());
    }

    #[test]
    fn ensure_capacity_doubles_until_large_enough() {
        let mut b = OutputBuffer::with_capacity(4).unwrap();
        b.ensure_capacity(33).unwrap();
        assert_eq!(64, b.capacity());

        // already big enough: no change
        b.ensure_capacity(10).unwrap();
        assert_eq!(64, b.capacity());
    }

    #[test]
    fn append_grows_as_needed() {
        let mut b = OutputBuffer::with_capacity(2).unwrap();
        b.append(&[9; 5]).unwrap();
        assert_eq!(8, b.capacity());
        assert_eq!(vec![9; 5], b.into_vec());
    }

    #[test]
    fn advance_marks_spare_bytes_filled() {
        let mut b = OutputBuffer::with_capacity(8).unwrap();
        b.spare_mut()[..3].copy_from_slice(&[5, 6, 7]);
        b.advance(3);
        assert_eq!(&[5, 6, 7], b.as_slice());

        b.as_mut_slice()[0] = 4;
        assert_eq!(vec![4, 6, 7], b.into_vec());
    }

    #[test]
    #[should_panic]
    fn advance_past_capacity_panics() {
        let mut b = OutputBuffer::with_capacity(2).unwrap();
        b.advance(3);
    }

    #[test]
    fn zero_capacity_can_grow() {
        let mut b = OutputBuffer::with_capacity(0).unwrap();
        assert!(b.is_full());
        b.grow().unwrap();
        assert_eq!(2, b.capacity());
    }
}
