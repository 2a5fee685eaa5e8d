//! Fixed-capacity byte buffers with independent read/write cursors.
//!
//! # Invariant
//! `0 <= offset <= length <= capacity` at all times. A buffer is *drained*
//! exactly when `offset == length`.
//!
//! Storage is allocated once at construction and never grows; transactions
//! only move the cursors.

use std::io;

use thiserror::Error;

/// Errors raised by checked buffer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Appending would exceed the fixed capacity.
    #[error("buffer overflow: {requested} bytes requested, {available} available")]
    Overflow { requested: usize, available: usize },

    /// Advancing a cursor past the bytes it covers.
    #[error("cursor overrun: advance by {requested} with only {available} bytes left")]
    Overrun { requested: usize, available: usize },
}

/// A byte buffer with a fill cursor (`length`) and a consume cursor (`offset`).
#[derive(Debug)]
pub struct ByteBuffer {
    data: Box<[u8]>,
    length: usize,
    offset: usize,
}

impl ByteBuffer {
    /// Allocate a zeroed buffer of exactly `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            length: 0,
            offset: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of bytes already consumed.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_full(&self) -> bool {
        self.length == self.data.len()
    }

    pub fn is_drained(&self) -> bool {
        self.offset == self.length
    }

    /// Free space after the valid bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.length
    }

    /// All valid bytes, consumed or not.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Valid bytes not yet consumed.
    pub fn pending(&self) -> &[u8] {
        &self.data[self.offset..self.length]
    }

    /// Writable region past the valid bytes. Follow with [`commit`](Self::commit).
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.length..]
    }

    /// Mark `n` bytes of the spare region as valid.
    pub fn commit(&mut self, n: usize) -> Result<(), BufferError> {
        let available = self.remaining();
        if n > available {
            return Err(BufferError::Overflow {
                requested: n,
                available,
            });
        }
        self.length += n;
        Ok(())
    }

    /// Advance the consume cursor by `n` bytes.
    pub fn consume(&mut self, n: usize) -> Result<(), BufferError> {
        let available = self.length - self.offset;
        if n > available {
            return Err(BufferError::Overrun {
                requested: n,
                available,
            });
        }
        self.offset += n;
        Ok(())
    }

    /// Copy `bytes` after the valid region, failing without side effects when
    /// they do not fit.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        let available = self.remaining();
        if bytes.len() > available {
            return Err(BufferError::Overflow {
                requested: bytes.len(),
                available,
            });
        }
        self.data[self.length..self.length + bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();
        Ok(())
    }

    /// Return every consumed byte to pending.
    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    /// Reset both cursors; contents become garbage.
    pub fn clear(&mut self) {
        self.length = 0;
        self.offset = 0;
    }
}

/// Bounded writer: accepts bytes until the buffer is full, then reports
/// `Ok(0)` which `write_all` turns into `WriteZero`.
impl io::Write for ByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        self.data[self.length..self.length + n].copy_from_slice(&buf[..n]);
        self.length += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
