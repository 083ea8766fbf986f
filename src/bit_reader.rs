//! LSB-first bit reader over a [`ChunkBuffer`] byte source. DEFLATE packs
//! bits into bytes least-significant-bit first, which is why this is a
//! ground-up rewrite rather than a generalization of this crate's previous
//! byte-pointer-oriented `BitReader` (Oodle's bit streams are read MSB-first
//! out of a fixed byte range, a different shape entirely). See DESIGN.md.

use crate::chunk_buffer::{Checkpoint, ChunkBuffer};
use crate::error::{Need, Outcome};

/// Maximum number of bits a single `shift` call may request. RFC 1951 never
/// needs more than this many bits in one pull (a dynamic-block header field
/// plus its extra bits never exceeds it), and it keeps `buf` comfortably
/// within a `u64`.
pub const MAX_SHIFT: u32 = 57;

#[derive(Debug, Clone, Copy)]
pub struct BitReaderCheckpoint {
    buffer: Checkpoint,
    buf: u64,
    len: u32,
}

/// A 64-bit accumulator of pending bits, low `len` bits valid, drawn
/// LSB-first from an underlying [`ChunkBuffer`].
#[derive(Debug, Default)]
pub struct BitReader {
    buf: u64,
    len: u32,
}

impl BitReader {
    pub fn new() -> Self {
        BitReader::default()
    }

    /// Fills `buf` until at least `n` bits are buffered (or the source
    /// underflows), consuming bytes from `source` as needed but never
    /// discarding bits already present. A partial fill before underflow is
    /// retained so a retried call makes progress.
    fn fill(&mut self, source: &mut ChunkBuffer, n: u32) -> Outcome<()> {
        debug_assert!(n <= 64);
        while self.len < n {
            match source.next_byte() {
                Outcome::Done(byte) => {
                    self.buf |= (byte as u64) << self.len;
                    self.len += 8;
                }
                Outcome::NeedMore(need) => return Outcome::NeedMore(need),
            }
        }
        Outcome::Done(())
    }

    /// Returns the low `n` bits, optionally consuming them. Suspends with
    /// `NeedMore` (without losing already-buffered bits) if the source runs
    /// dry first.
    pub fn shift(&mut self, source: &mut ChunkBuffer, n: u32, consume: bool) -> Outcome<u32> {
        debug_assert!(n <= MAX_SHIFT);
        match self.fill(source, n) {
            Outcome::Done(()) => {}
            Outcome::NeedMore(need) => return Outcome::NeedMore(need),
        }
        let mask = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
        let bits = (self.buf & mask) as u32;
        if consume {
            self.drop(n);
        }
        Outcome::Done(bits)
    }

    /// Drops `n` already-buffered bits. Precondition: `n <= len`.
    pub fn drop(&mut self, n: u32) {
        debug_assert!(n <= self.len, "drop({n}) exceeds {} buffered bits", self.len);
        self.buf >>= n;
        self.len -= n;
    }

    /// Discards fractional-byte state, realigning to the next byte boundary
    /// of the underlying source. Used when entering a stored block.
    pub fn reset(&mut self) {
        self.buf = 0;
        self.len = 0;
    }

    pub fn bits_buffered(&self) -> u32 {
        self.len
    }

    /// Saves enough state to resume a decode from exactly this point: the
    /// chunk buffer's read cursor plus the bit accumulator.
    pub fn checkpoint(&self, source: &ChunkBuffer) -> BitReaderCheckpoint {
        BitReaderCheckpoint {
            buffer: source.checkpoint(),
            buf: self.buf,
            len: self.len,
        }
    }

    pub fn restore(&mut self, source: &mut ChunkBuffer, checkpoint: BitReaderCheckpoint) {
        source.restore(checkpoint.buffer);
        self.buf = checkpoint.buf;
        self.len = checkpoint.len;
    }
}
