//! An append-only byte queue with a read cursor, the lowest layer of the
//! decode pipeline. Everything above this layer reads through
//! [`ChunkBuffer`] rather than touching a raw `&[u8]`, so that the whole
//! decoder can suspend and resume across chunk boundaries instead of
//! requiring the full stream up front.

use crate::error::{Need, Outcome};

/// A saved read position. Restoring one rewinds the cursor; it does not by
/// itself prevent [`ChunkBuffer::compact`] from discarding bytes below the
/// *current* cursor, so callers must restore before compacting. This matches
/// the resumable inflator's snapshot-at-block-start discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

#[derive(Debug, Default)]
pub struct ChunkBuffer {
    data: Vec<u8>,
    /// Stream position of `data[0]`; bumped by `compact`.
    base: usize,
    /// Stream position of the next unread byte.
    offset: usize,
    closed: bool,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        ChunkBuffer::default()
    }

    /// Push bytes onto the tail of the buffer. A no-op once [`Self::close_end`]
    /// has latched: append is idempotent after close.
    pub fn append(&mut self, chunk: &[u8]) {
        if self.closed {
            log::warn!("ignoring {} bytes appended after stream close", chunk.len());
            return;
        }
        log::trace!(
            "chunk buffer: +{} bytes (total buffered {})",
            chunk.len(),
            self.data.len() + chunk.len()
        );
        self.data.extend_from_slice(chunk);
    }

    /// Latches end-of-stream. One-way: once closed, always closed.
    pub fn close_end(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn local(&self) -> usize {
        self.offset - self.base
    }

    fn available(&self) -> usize {
        self.data.len() - self.local()
    }

    fn underflow<T>(&self) -> Outcome<T> {
        if self.closed {
            Outcome::NeedMore(Need::Closed)
        } else {
            Outcome::NeedMore(Need::Open)
        }
    }

    /// Reads exactly `n` bytes starting at the cursor, advancing it. Returns
    /// `NeedMore` without consuming anything if fewer than `n` bytes are
    /// currently buffered.
    pub fn try_take(&mut self, n: usize) -> Outcome<Vec<u8>> {
        if self.available() < n {
            return self.underflow();
        }
        let start = self.local();
        let bytes = self.data[start..start + n].to_vec();
        self.offset += n;
        Outcome::Done(bytes)
    }

    /// Looks at the next byte without consuming it.
    pub fn peek_byte(&self) -> Outcome<u8> {
        if self.available() == 0 {
            return self.underflow();
        }
        Outcome::Done(self.data[self.local()])
    }

    /// Consumes and returns the next byte.
    pub fn next_byte(&mut self) -> Outcome<u8> {
        match self.peek_byte() {
            Outcome::Done(b) => {
                self.offset += 1;
                Outcome::Done(b)
            }
            Outcome::NeedMore(n) => Outcome::NeedMore(n),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.offset)
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 >= self.base, "checkpoint predates last compaction");
        self.offset = checkpoint.0;
    }

    /// Drops the consumed prefix. Safe to call whenever the caller holds no
    /// checkpoint older than the current cursor.
    pub fn compact(&mut self) {
        let local = self.local();
        if local == 0 {
            return;
        }
        self.data.drain(..local);
        self.base = self.offset;
    }

    pub fn position(&self) -> usize {
        self.offset
    }
}
