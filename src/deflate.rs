//! RFC 1951 DEFLATE decoder, the algorithmic heart of this crate. Resumable
//! by construction: every block is decoded from a checkpointed bit/byte
//! position, and an underflow rolls the block back to that checkpoint
//! rather than leaving partial state behind. Implemented by snapshotting
//! cheaply at block boundaries instead of serializing a portable checkpoint
//! blob.

use crate::bit_reader::{BitReader, MAX_SHIFT};
use crate::chunk_buffer::ChunkBuffer;
use crate::error::{raise, try_ready, DensityError, Outcome, Res};
use crate::huffman::HuffmanTable;
use std::sync::OnceLock;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
const LENGTH_EXTRA: [u32; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_BASE: [u32; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u32; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];
/// Permutation for placing the HCLEN code-length-alphabet lengths into their
/// 19-slot array, per RFC 1951 §3.2.7.
const CL_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const MAX_WINDOW: usize = 32 * 1024;

fn fixed_literal_table() -> &'static HuffmanTable {
    static TABLE: OnceLock<HuffmanTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut lengths = [0u8; 288];
        lengths[0..144].fill(8);
        lengths[144..256].fill(9);
        lengths[256..280].fill(7);
        lengths[280..288].fill(8);
        HuffmanTable::build(&lengths).expect("fixed literal/length table is well-formed")
    })
}

fn fixed_distance_table() -> &'static HuffmanTable {
    static TABLE: OnceLock<HuffmanTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let lengths = [5u8; 32];
        HuffmanTable::build(&lengths).expect("fixed distance table is well-formed")
    })
}

/// The most recent <= 32768 decoded bytes, indexed for LZ77 back-references.
///
/// This crate keeps the *entire* decoded stream (the CCP4 reader downstream
/// needs the whole file in memory regardless), so in practice nothing is
/// ever evicted. See DESIGN.md for why that is the right call here even
/// though the wire format only requires a bounded ring. `copy_back` still
/// enforces the `distance <= 32768` wire-format limit independent of how
/// much history we happen to be holding onto.
#[derive(Debug, Default)]
struct Window {
    data: Vec<u8>,
}

impl Window {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    fn push(&mut self, byte: u8) {
        self.data.push(byte);
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Copies `length` bytes from `distance` bytes back, one byte at a time
    /// so that `distance < length` correctly produces a repeating run
    /// instead of a single bounded block copy.
    fn copy_back(&mut self, distance: usize, length: usize) -> Res<()> {
        if distance == 0 || distance > MAX_WINDOW || distance > self.data.len() {
            return raise(DensityError::InvalidDeflateBlock {
                reason: "back-reference distance exceeds available history",
            });
        }
        let mut src = self.data.len() - distance;
        for _ in 0..length {
            let byte = self.data[src];
            self.data.push(byte);
            src += 1;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Stored,
    Fixed,
    Dynamic,
}

#[derive(Debug)]
pub struct DeflateInflator {
    bit_reader: BitReader,
    window: Window,
    emitted: usize,
    finished: bool,
}

impl DeflateInflator {
    pub fn new() -> Self {
        DeflateInflator {
            bit_reader: BitReader::new(),
            window: Window::default(),
            emitted: 0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns whatever bytes have been fully decoded since the last call,
    /// regardless of whether the most recent `poll` suspended partway
    /// through a later block.
    pub fn drain_decoded(&mut self) -> Vec<u8> {
        let bytes = self.window.data[self.emitted..].to_vec();
        self.emitted = self.window.len();
        bytes
    }

    /// Decodes blocks until the stream's final block finishes or the source
    /// underflows. On underflow the block in progress is rolled back to its
    /// start so the next call re-decodes it in full.
    pub fn poll(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        while !self.finished {
            let bits_checkpoint = self.bit_reader.checkpoint(source);
            let window_checkpoint = self.window.len();
            match self.decode_block(source) {
                Ok(Outcome::Done(bfinal)) => {
                    if bfinal {
                        self.finished = true;
                    }
                }
                Ok(Outcome::NeedMore(need)) => {
                    self.window.truncate(window_checkpoint);
                    self.bit_reader.restore(source, bits_checkpoint);
                    return Outcome::NeedMore(need).fatal_on_closed();
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Outcome::Done(()))
    }

    /// Decodes exactly one block, returning whether `BFINAL` was set.
    fn decode_block(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<bool>> {
        let bfinal = try_ready!(self.bit_reader.shift(source, 1, true)) != 0;
        let btype = try_ready!(self.bit_reader.shift(source, 2, true));
        let block_type = match btype {
            0 => BlockType::Stored,
            1 => BlockType::Fixed,
            2 => BlockType::Dynamic,
            _ => {
                return raise(DensityError::InvalidDeflateBlock {
                    reason: "reserved BTYPE 3",
                })
            }
        };
        log::trace!("deflate block: type={block_type:?} final={bfinal}");

        match block_type {
            BlockType::Stored => try_ready!(self.decode_stored(source)?),
            BlockType::Fixed => try_ready!(self.decode_huffman_block(
                source,
                fixed_literal_table(),
                fixed_distance_table()
            )?),
            BlockType::Dynamic => {
                let (lit, dist) = try_ready!(self.read_dynamic_tables(source)?);
                try_ready!(self.decode_huffman_block(source, &lit, &dist)?)
            }
        }
        Ok(Outcome::Done(bfinal))
    }

    fn decode_stored(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        self.bit_reader.reset();
        let len = try_ready!(source.try_take(2));
        let nlen = try_ready!(source.try_take(2));
        let len = u16::from_le_bytes([len[0], len[1]]);
        let nlen = u16::from_le_bytes([nlen[0], nlen[1]]);
        if len != !nlen {
            return raise(DensityError::InvalidDeflateBlock {
                reason: "stored block LEN does not match one's complement of NLEN",
            });
        }
        let bytes = try_ready!(source.try_take(len as usize));
        self.window.extend(&bytes);
        Ok(Outcome::Done(()))
    }

    fn read_dynamic_tables(
        &mut self,
        source: &mut ChunkBuffer,
    ) -> Res<Outcome<(HuffmanTable, HuffmanTable)>> {
        let hlit = try_ready!(self.bit_reader.shift(source, 5, true)) as usize + 257;
        let hdist = try_ready!(self.bit_reader.shift(source, 5, true)) as usize + 1;
        let hclen = try_ready!(self.bit_reader.shift(source, 4, true)) as usize + 4;

        let mut cl_lengths = [0u8; 19];
        for &slot in CL_ORDER.iter().take(hclen) {
            cl_lengths[slot] = try_ready!(self.bit_reader.shift(source, 3, true)) as u8;
        }
        let cl_table = match HuffmanTable::build(&cl_lengths) {
            Ok(t) => t,
            Err(e) => return Err(e),
        };

        let mut lengths = vec![0u8; hlit + hdist];
        let mut i = 0;
        while i < lengths.len() {
            let peeked = try_ready!(self
                .bit_reader
                .shift(source, cl_table.max_code_length(), false));
            let (symbol, consumed) = cl_table.lookup(peeked);
            if consumed == 0 {
                return raise(DensityError::InvalidHuffmanSymbol { symbol, max: 18 });
            }
            self.bit_reader.drop(consumed);
            match symbol {
                0..=15 => {
                    lengths[i] = symbol as u8;
                    i += 1;
                }
                16 => {
                    if i == 0 {
                        return raise(DensityError::InvalidDeflateBlock {
                            reason: "repeat-previous code (16) at the start of the length series",
                        });
                    }
                    let repeat = try_ready!(self.bit_reader.shift(source, 2, true)) + 3;
                    let prev = lengths[i - 1];
                    for _ in 0..repeat {
                        if i >= lengths.len() {
                            return raise(DensityError::InvalidDeflateBlock {
                                reason: "code-length repeat run overflows HLIT+HDIST",
                            });
                        }
                        lengths[i] = prev;
                        i += 1;
                    }
                }
                17 => {
                    let repeat = try_ready!(self.bit_reader.shift(source, 3, true)) + 3;
                    i += repeat as usize;
                }
                18 => {
                    let repeat = try_ready!(self.bit_reader.shift(source, 7, true)) + 11;
                    i += repeat as usize;
                }
                other => {
                    return raise(DensityError::InvalidHuffmanSymbol {
                        symbol: other,
                        max: 18,
                    })
                }
            }
        }
        if lengths.len() != hlit + hdist || i != lengths.len() {
            return raise(DensityError::InvalidDeflateBlock {
                reason: "code-length series overran HLIT+HDIST",
            });
        }

        let lit_table = match HuffmanTable::build(&lengths[..hlit]) {
            Ok(t) => t,
            Err(e) => return Err(e),
        };
        let dist_table = match HuffmanTable::build(&lengths[hlit..]) {
            Ok(t) => t,
            Err(e) => return Err(e),
        };
        Ok(Outcome::Done((lit_table, dist_table)))
    }

    fn decode_huffman_block(
        &mut self,
        source: &mut ChunkBuffer,
        lit_table: &HuffmanTable,
        dist_table: &HuffmanTable,
    ) -> Res<Outcome<()>> {
        loop {
            debug_assert!(lit_table.max_code_length() <= MAX_SHIFT);
            let peeked = try_ready!(self
                .bit_reader
                .shift(source, lit_table.max_code_length(), false));
            let (symbol, consumed) = lit_table.lookup(peeked);
            if consumed == 0 {
                return raise(DensityError::InvalidHuffmanSymbol { symbol, max: 285 });
            }
            self.bit_reader.drop(consumed);

            match symbol {
                0..=255 => self.window.push(symbol as u8),
                256 => return Ok(Outcome::Done(())),
                257..=285 => {
                    let idx = (symbol - 257) as usize;
                    let extra = try_ready!(self.bit_reader.shift(source, LENGTH_EXTRA[idx], true));
                    let length = LENGTH_BASE[idx] as u32 + extra;

                    let peeked = try_ready!(self
                        .bit_reader
                        .shift(source, dist_table.max_code_length(), false));
                    let (dsym, dconsumed) = dist_table.lookup(peeked);
                    if dconsumed == 0 || dsym > 29 {
                        return raise(DensityError::InvalidHuffmanSymbol { symbol: dsym, max: 29 });
                    }
                    self.bit_reader.drop(dconsumed);
                    let didx = dsym as usize;
                    let dextra = try_ready!(self.bit_reader.shift(source, DIST_EXTRA[didx], true));
                    let distance = DIST_BASE[didx] + dextra;

                    self.window.copy_back(distance as usize, length as usize)?;
                }
                other => {
                    return raise(DensityError::InvalidHuffmanSymbol {
                        symbol: other,
                        max: 285,
                    })
                }
            }
        }
    }
}

impl Default for DeflateInflator {
    fn default() -> Self {
        DeflateInflator::new()
    }
}
