//! Black-box scenario tests driven entirely through the public API
//! (`Orchestrator`, `Config`, `DensityMap`). `GzipFramer`/`DeflateInflator`
//! are crate-private, so the raw-byte-stream scenarios are exercised
//! end-to-end by wrapping them in a minimal CCP4 map instead of observing
//! decoded bytes directly; the gzip/deflate layers also carry their own
//! colocated unit tests for the byte-stream-only properties (stored-block
//! LEN/NLEN mismatch, header flag parsing, etc).
//!
//! Each synthetic gzip member here is hand-built with a small bit writer
//! mirroring `BitReader`'s LSB-first packing, so the fixed-Huffman cases
//! exercise the real Huffman decode path rather than falling back to
//! stored blocks everywhere.

use density_stream::{Config, Orchestrator};

const MAP_MAGIC: u32 = 0x2050_414D;
const HEADER_BYTES: usize = 1024;

fn put_i32(header: &mut [u8], word: usize, value: i32) {
    header[word * 4..word * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_f32(header: &mut [u8], word: usize, value: f32) {
    header[word * 4..word * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

fn ccp4_header(mode: i32, nc: i32, nr: i32, ns: i32, nsymbt: i32) -> Vec<u8> {
    let mut h = vec![0u8; HEADER_BYTES];
    put_i32(&mut h, 0, nc);
    put_i32(&mut h, 1, nr);
    put_i32(&mut h, 2, ns);
    put_i32(&mut h, 3, mode);
    put_i32(&mut h, 7, nc);
    put_i32(&mut h, 8, nr);
    put_i32(&mut h, 9, ns);
    put_f32(&mut h, 10, 1.0);
    put_f32(&mut h, 11, 1.0);
    put_f32(&mut h, 12, 1.0);
    put_f32(&mut h, 13, 90.0);
    put_f32(&mut h, 14, 90.0);
    put_f32(&mut h, 15, 90.0);
    put_i32(&mut h, 16, 1);
    put_i32(&mut h, 17, 2);
    put_i32(&mut h, 18, 3);
    put_i32(&mut h, 22, 1);
    put_i32(&mut h, 23, nsymbt);
    h[52 * 4..52 * 4 + 4].copy_from_slice(&MAP_MAGIC.to_le_bytes());
    h
}

fn gzip_wrap_stored(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF];
    out.push(0b001); // BFINAL=1, BTYPE=00 stored
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&[0u8; 8]); // CRC/ISIZE unverified by default Config
    out
}

/// A bit-level writer mirroring `BitReader`'s LSB-first convention: the
/// first value pushed occupies the low bits of the first output byte.
struct BitWriter {
    acc: u64,
    nbits: u32,
    bytes: Vec<u8>,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            acc: 0,
            nbits: 0,
            bytes: Vec::new(),
        }
    }

    fn push(&mut self, value: u32, len: u32) {
        self.acc |= (value as u64) << self.nbits;
        self.nbits += len;
        while self.nbits >= 8 {
            self.bytes.push((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.nbits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.bytes.push((self.acc & 0xFF) as u8);
        }
        self.bytes
    }
}

fn reverse_bits(code: u32, len: u32) -> u32 {
    let mut v = code;
    let mut r = 0u32;
    for _ in 0..len {
        r = (r << 1) | (v & 1);
        v >>= 1;
    }
    r
}

/// Fixed literal/length code (value, length) per RFC 1951's canonical
/// construction over the standard 8/9/7/8-bit length assignment.
fn fixed_litlen_code(symbol: u32) -> (u32, u32) {
    match symbol {
        0..=143 => (48 + symbol, 8),
        144..=255 => (400 + (symbol - 144), 9),
        256..=279 => (symbol - 256, 7),
        _ => (192 + (symbol - 280), 8),
    }
}

fn fixed_dist_code(symbol: u32) -> (u32, u32) {
    (symbol, 5)
}

fn push_litlen(w: &mut BitWriter, symbol: u32) {
    let (code, len) = fixed_litlen_code(symbol);
    w.push(reverse_bits(code, len), len);
}

fn push_dist(w: &mut BitWriter, symbol: u32) {
    let (code, len) = fixed_dist_code(symbol);
    w.push(reverse_bits(code, len), len);
}

/// Encodes `payload` as a single final fixed-Huffman block, literals only.
fn fixed_huffman_literals(payload: &[u8]) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.push(1, 1); // BFINAL
    w.push(1, 2); // BTYPE=01 fixed
    for &byte in payload {
        push_litlen(&mut w, byte as u32);
    }
    push_litlen(&mut w, 256); // end-of-block
    w.finish()
}

/// A non-final stored block (raw header bytes) followed by a final
/// fixed-Huffman block whose payload is `"ab"` + `"a" * 298` encoded with a
/// `distance=1, length=258` back-reference followed by a second
/// `distance=1, length=39` back-reference. The run-extension case where a
/// copy's distance is shorter than its length.
fn stored_header_then_run_extension(header: &[u8]) -> Vec<u8> {
    assert_eq!(header.len(), HEADER_BYTES);
    let mut out = Vec::new();
    out.push(0b000); // BFINAL=0, BTYPE=00 stored
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(&(!(header.len() as u16)).to_le_bytes());
    out.extend_from_slice(header);

    let mut w = BitWriter::new();
    w.push(1, 1); // BFINAL
    w.push(1, 2); // BTYPE=01 fixed
    push_litlen(&mut w, b'a' as u32);
    push_litlen(&mut w, b'b' as u32);
    push_litlen(&mut w, b'a' as u32);
    push_litlen(&mut w, 285); // length 258, 0 extra bits
    push_dist(&mut w, 0); // distance 1, 0 extra bits
    push_litlen(&mut w, 273); // length base 35, 3 extra bits
    w.push(4, 3); // extra=4 -> length 39
    push_dist(&mut w, 0); // distance 1 again
    push_litlen(&mut w, 256); // end-of-block
    out.extend(w.finish());
    out
}

/// Wraps a raw, already-bit-packed deflate stream in a gzip member. Padding
/// the trailer region past the mandatory 8 bytes gives `BitReader`'s
/// generic `max_code_length`-wide peek (used for every Huffman symbol,
/// including the final end-of-block code) somewhere harmless to land if it
/// needs to pull one byte further than that symbol's own code length.
/// `Config::default()` never inspects the trailer's actual bytes, so the
/// padding's content doesn't matter, only that `try_take` never underflows.
fn gzip_wrap_raw_deflate(deflate_bytes: &[u8]) -> Vec<u8> {
    let mut out = vec![0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF];
    out.extend_from_slice(deflate_bytes);
    out.extend_from_slice(&[0u8; 16]);
    out
}

/// S1 + S3: a stored block carries the 1024-byte CCP4 header, then a
/// fixed-Huffman block whose payload is a 300-byte run built entirely from
/// `distance < length` back-references.
#[test]
fn s1_s3_stored_header_then_huffman_run_extension() {
    let header = ccp4_header(0, 300, 1, 1, 0);
    let deflate = stored_header_then_run_extension(&header);
    let gzipped = gzip_wrap_raw_deflate(&deflate);

    let mut orchestrator = Orchestrator::new(Config::default());
    orchestrator.push_chunk(&gzipped).unwrap();
    orchestrator.finish().unwrap();
    assert!(orchestrator.is_finished());

    let map = orchestrator.into_density_map();
    assert_eq!(map.size, (300, 1, 1));
    let mut expected = vec![b'a' as i8 as f32, b'b' as i8 as f32];
    expected.extend(std::iter::repeat(b'a' as i8 as f32).take(298));
    assert_eq!(map.data, expected);
}

/// S4: the same fixed-Huffman-encoded payload, fed to the orchestrator one
/// byte at a time, decodes identically to a single-shot call.
#[test]
fn s4_one_byte_chunking_matches_whole_input() {
    let header = ccp4_header(2, 2, 1, 1, 0);
    let mut payload = header;
    payload.extend_from_slice(&1.0f32.to_le_bytes());
    payload.extend_from_slice(&2.0f32.to_le_bytes());
    let gzipped = gzip_wrap_raw_deflate(&fixed_huffman_literals(&payload));

    let mut whole = Orchestrator::new(Config::default());
    whole.push_chunk(&gzipped).unwrap();
    whole.finish().unwrap();
    let whole_map = whole.into_density_map();

    let mut chunked = Orchestrator::new(Config::default());
    for (i, &byte) in gzipped.iter().enumerate() {
        chunked.push_chunk(&[byte]).unwrap();
        if i + 1 == gzipped.len() {
            chunked.finish().unwrap();
        }
    }
    assert!(chunked.is_finished());
    let chunked_map = chunked.into_density_map();

    assert_eq!(whole_map.data, chunked_map.data);
    assert_eq!(whole_map.data, vec![1.0, 2.0]);
}

/// S5: a mode-2 CCP4 map with a 4x4x4 grid of uniform voxels.
#[test]
fn s5_mode2_ccp4_map() {
    let mut bytes = ccp4_header(2, 4, 4, 4, 0);
    for _ in 0..64 {
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
    }
    let gzipped = gzip_wrap_stored(&bytes);

    let mut orchestrator = Orchestrator::new(Config::default());
    orchestrator.push_chunk(&gzipped).unwrap();
    orchestrator.finish().unwrap();
    let map = orchestrator.into_density_map();

    assert_eq!(map.size, (4, 4, 4));
    assert_eq!(map.data.len(), 64);
    assert!(map.data.iter().all(|&v| v == 1.0));
}

/// S6: a symmetry operator record parses into the expected affine matrix,
/// observed through the `DensityMap` a full decode produces.
#[test]
fn s6_symmetry_operator_matches_expected_matrix() {
    let mut bytes = ccp4_header(2, 1, 1, 1, 80);
    let mut record = format!("{:<80}", "-x+1/2, y, z+1/4").into_bytes();
    record.truncate(80);
    bytes.extend_from_slice(&record);
    bytes.extend_from_slice(&1.0f32.to_le_bytes());
    let gzipped = gzip_wrap_stored(&bytes);

    let mut orchestrator = Orchestrator::new(Config::default());
    orchestrator.push_chunk(&gzipped).unwrap();
    orchestrator.finish().unwrap();
    let map = orchestrator.into_density_map();

    assert_eq!(map.symmetry_ops.len(), 1);
    let m = map.symmetry_ops[0];
    assert_eq!(m[0], [-1.0, 0.0, 0.0, 0.5]);
    assert_eq!(m[1], [0.0, 1.0, 0.0, 0.0]);
    assert_eq!(m[2], [0.0, 0.0, 1.0, 0.25]);
    assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
}
