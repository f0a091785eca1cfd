//! Fixed-capacity byte buffer shared by the decoders and the connection context.
//!
//! A [`FrameBuffer`] is always *appendable* between calls: the pending bytes sit
//! at the front of the allocation and new bytes are written at the tail. The
//! readable mode only exists as a [`ReadView`], a borrow of the buffer that
//! consumes bytes from the front and compacts the remainder back to the start
//! when it is dropped.
//!
//! ```text
//!  appendable                     readable (ReadView)
//!  ┌──────────────┬──────────┐    ┌────┬─────────┬──────────┐
//!  │ pending      │ spare    │    │done│ pending │ spare    │
//!  └──────────────┴──────────┘    └────┴─────────┴──────────┘
//!  0             len        cap   0   pos       len        cap
//! ```
//!
//! Because the view holds `&mut FrameBuffer`, nothing can append to a buffer
//! while it is being read, and the buffer is compacted before control returns
//! to the owner.

use std::fmt;
use std::io::{self, Read, Write};

pub struct FrameBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Creates a buffer holding `bytes`, sized exactly to fit them.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buffer = Self::with_capacity(bytes.len());
        buffer.put_slice(bytes);
        buffer
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes waiting to be consumed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spare capacity at the tail.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.len
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn pending(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Appends `bytes` if they fit entirely. Nothing is written otherwise.
    pub fn put_slice(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining() {
            return false;
        }
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        true
    }

    /// Appends as many bytes of `bytes` as fit, returning the count.
    pub fn fill_from(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining());
        self.data[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        n
    }

    /// Performs a single read into the spare capacity.
    ///
    /// Callers must check [`has_remaining`](Self::has_remaining) first: with no
    /// spare capacity a reader returns `Ok(0)`, which is indistinguishable
    /// from end-of-stream.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        debug_assert!(self.has_remaining(), "read into a full FrameBuffer");
        let n = reader.read(&mut self.data[self.len..])?;
        self.len += n;
        Ok(n)
    }

    /// Performs a single write of the pending bytes and compacts what is left.
    pub fn write_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<usize> {
        let mut view = self.readable();
        let n = writer.write(view.as_slice())?;
        view.consume(n);
        Ok(n)
    }

    /// Switches to readable mode for the lifetime of the returned view.
    pub fn readable(&mut self) -> ReadView<'_> {
        ReadView {
            buffer: self,
            pos: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Readable mode of a [`FrameBuffer`]. Dropping the view compacts the buffer.
pub struct ReadView<'a> {
    buffer: &'a mut FrameBuffer,
    pos: usize,
}

impl ReadView<'_> {
    pub fn remaining(&self) -> usize {
        self.buffer.len - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer.data[self.pos..self.buffer.len]
    }

    /// Marks `n` bytes as consumed. Panics if fewer than `n` are available.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.remaining(), "consumed past the readable limit");
        self.pos += n;
    }

    /// Copies up to `dst.len()` bytes into `dst` and consumes them.
    pub fn copy_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.buffer.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

impl Drop for ReadView<'_> {
    fn drop(&mut self) {
        if self.pos == 0 {
            return;
        }
        let len = self.buffer.len;
        self.buffer.data.copy_within(self.pos..len, 0);
        self.buffer.len = len - self.pos;
    }
}
