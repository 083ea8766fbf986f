//! CCP4/MRC electron-density map reader. Consumes the byte stream
//! [`crate::gzip::GzipFramer`] produces and materializes a [`DensityMap`].
//! Byte-oriented, word-indexed header decoding, generalized from a 2-byte
//! header to CCP4's 1024-byte one.

pub mod symmetry;

use crate::chunk_buffer::ChunkBuffer;
use crate::density::{DensityMap, Matrix4};
use crate::error::{raise, DensityError, Need, Outcome, Res};

const HEADER_WORDS: usize = 256;
const HEADER_BYTES: usize = HEADER_WORDS * 4;
const MAP_MAGIC: u32 = 0x2050_414D; // "MAP " little-endian as a u32 word

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Symmetry,
    Payload,
    Trailing,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct HeaderFields {
    size: (i32, i32, i32),
    mode: i32,
    start: (i32, i32, i32),
    intervals: (i32, i32, i32),
    cell_size: (f32, f32, f32),
    angles: (f32, f32, f32),
    axes: (i32, i32, i32),
    a_min: f32,
    a_max: f32,
    a_mean: f32,
    space_group_number: i32,
    nsymbt: i32,
    lskflg: i32,
    skwmat: [f32; 9],
    skwtrn: [f32; 3],
    a_rms: f32,
}

/// Reads one CCP4/MRC map from a decoded byte stream, suspending at
/// `ChunkBuffer` underflow just like the layers beneath it.
#[derive(Debug)]
pub struct Ccp4MapReader {
    stage: Stage,
    header: Option<HeaderFields>,
    expected_total_bytes: u64,
    bytes_consumed: u64,
    symmetry_ops: Vec<Matrix4>,
    voxels: Vec<f32>,
}

impl Ccp4MapReader {
    pub fn new() -> Self {
        Ccp4MapReader {
            stage: Stage::Header,
            header: None,
            expected_total_bytes: 0,
            bytes_consumed: 0,
            symmetry_ops: Vec::new(),
            voxels: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn poll(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        loop {
            match self.stage {
                Stage::Header => match self.parse_header(source)? {
                    Outcome::Done(()) => self.stage = Stage::Symmetry,
                    Outcome::NeedMore(need) => return Ok(Outcome::NeedMore(need)),
                },
                Stage::Symmetry => match self.parse_symmetry(source)? {
                    Outcome::Done(()) => self.stage = Stage::Payload,
                    Outcome::NeedMore(need) => return Ok(Outcome::NeedMore(need)),
                },
                Stage::Payload => match self.parse_payload(source)? {
                    Outcome::Done(()) => self.stage = Stage::Trailing,
                    Outcome::NeedMore(need) => return Ok(Outcome::NeedMore(need)),
                },
                Stage::Trailing => match self.check_no_trailing_bytes(source)? {
                    Outcome::Done(()) => {
                        self.stage = Stage::Done;
                        return Ok(Outcome::Done(()));
                    }
                    Outcome::NeedMore(need) => return Ok(Outcome::NeedMore(need)),
                },
                Stage::Done => return Ok(Outcome::Done(())),
            }
        }
    }

    /// Consumes the map once fully decoded. Panics (a programmer error, not
    /// a decode error) if called before [`Self::is_finished`].
    pub fn into_density_map(self) -> DensityMap {
        let header = self.header.expect("map not fully parsed");
        let skew = if header.lskflg != 0 {
            let m = &header.skwmat;
            let t = &header.skwtrn;
            Some([
                [m[0], m[1], m[2], t[0]],
                [m[3], m[4], m[5], t[1]],
                [m[6], m[7], m[8], t[2]],
                [0.0, 0.0, 0.0, 1.0],
            ])
        } else {
            None
        };
        DensityMap {
            size: header.size,
            start: header.start,
            intervals: header.intervals,
            axes: header.axes,
            cell_size: header.cell_size,
            angles: header.angles,
            a_min: header.a_min,
            a_max: header.a_max,
            a_mean: header.a_mean,
            a_rms: header.a_rms,
            space_group_number: header.space_group_number,
            data: self.voxels,
            symmetry_ops: self.symmetry_ops,
            skew,
        }
    }

    fn parse_header(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        let checkpoint = source.checkpoint();
        let bytes = match source.try_take(HEADER_BYTES) {
            Outcome::Done(b) => b,
            Outcome::NeedMore(need) => {
                source.restore(checkpoint);
                return Outcome::NeedMore(need).fatal_on_closed();
            }
        };

        let word_i32 = |i: usize| i32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        let word_f32 = |i: usize| f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        let word_u32 = |i: usize| u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());

        let magic = word_u32(52);
        if magic != MAP_MAGIC {
            return raise(DensityError::BadCcp4Magic { found: magic });
        }

        let mode = word_i32(3);
        if mode != 0 && mode != 2 {
            return raise(DensityError::UnsupportedMode { mode });
        }

        let nsymbt = word_i32(23);
        if nsymbt % 4 != 0 {
            return raise(DensityError::SymmetryMisalignment { nsymbt });
        }

        let fields = HeaderFields {
            size: (word_i32(0), word_i32(1), word_i32(2)),
            mode,
            start: (word_i32(4), word_i32(5), word_i32(6)),
            intervals: (word_i32(7), word_i32(8), word_i32(9)),
            cell_size: (word_f32(10), word_f32(11), word_f32(12)),
            angles: (word_f32(13), word_f32(14), word_f32(15)),
            axes: (word_i32(16), word_i32(17), word_i32(18)),
            a_min: word_f32(19),
            a_max: word_f32(20),
            a_mean: word_f32(21),
            space_group_number: word_i32(22),
            nsymbt,
            lskflg: word_i32(24),
            skwmat: [
                word_f32(25),
                word_f32(26),
                word_f32(27),
                word_f32(28),
                word_f32(29),
                word_f32(30),
                word_f32(31),
                word_f32(32),
                word_f32(33),
            ],
            skwtrn: [word_f32(34), word_f32(35), word_f32(36)],
            a_rms: word_f32(54),
        };

        let bytes_per_voxel: i64 = if mode == 0 { 1 } else { 4 };
        let (nc, nr, ns) = fields.size;
        let voxel_count = nc as i64 * nr as i64 * ns as i64;
        let expected_total =
            HEADER_BYTES as i64 + fields.nsymbt as i64 + bytes_per_voxel * voxel_count;

        log::info!(
            "ccp4 header: size=({nc},{nr},{ns}) mode={mode} space_group={}",
            fields.space_group_number
        );

        self.expected_total_bytes = expected_total.max(0) as u64;
        self.bytes_consumed = HEADER_BYTES as u64;
        self.header = Some(fields);
        Ok(Outcome::Done(()))
    }

    fn parse_symmetry(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        let nsymbt = self.header.as_ref().unwrap().nsymbt;
        if nsymbt == 0 {
            return Ok(Outcome::Done(()));
        }
        let record_count = (nsymbt / 80) as usize;
        let checkpoint = source.checkpoint();
        let bytes = match source.try_take(nsymbt as usize) {
            Outcome::Done(b) => b,
            Outcome::NeedMore(need) => {
                source.restore(checkpoint);
                return Outcome::NeedMore(need).fatal_on_closed();
            }
        };
        for i in 0..record_count {
            let record = &bytes[i * 80..(i + 1) * 80];
            let text = String::from_utf8_lossy(record);
            match symmetry::parse_operator(&text) {
                Ok(matrix) => self.symmetry_ops.push(matrix),
                Err(e) => {
                    log::warn!("symmetry operator {i} failed to parse: {e}");
                    return Err(e);
                }
            }
        }
        self.bytes_consumed += nsymbt as u64;
        Ok(Outcome::Done(()))
    }

    fn parse_payload(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        let header = self.header.as_ref().unwrap();
        let (nc, nr, ns) = header.size;
        let mode = header.mode;
        let voxel_count = nc as usize * nr as usize * ns as usize;
        let bytes_per_voxel = if mode == 0 { 1 } else { 4 };
        let total = voxel_count * bytes_per_voxel;

        let checkpoint = source.checkpoint();
        let bytes = match source.try_take(total) {
            Outcome::Done(b) => b,
            Outcome::NeedMore(need) => {
                source.restore(checkpoint);
                return Outcome::NeedMore(need).fatal_on_closed();
            }
        };

        let mut voxels = Vec::with_capacity(voxel_count);
        match mode {
            0 => {
                for &byte in &bytes {
                    voxels.push(byte as i8 as f32);
                }
            }
            2 => {
                for chunk in bytes.chunks_exact(4) {
                    voxels.push(f32::from_le_bytes(chunk.try_into().unwrap()));
                }
            }
            other => return raise(DensityError::UnsupportedMode { mode: other }),
        }
        self.voxels = voxels;
        self.bytes_consumed += total as u64;
        Ok(Outcome::Done(()))
    }

    /// The total-size invariant can only be confirmed once the producer
    /// signals end of stream: any further byte would mean the header's
    /// implied size was wrong.
    fn check_no_trailing_bytes(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        match source.peek_byte() {
            Outcome::Done(_) => raise(DensityError::SizeMismatch {
                expected: self.expected_total_bytes,
                actual: self.bytes_consumed + 1,
            }),
            Outcome::NeedMore(Need::Closed) => Ok(Outcome::Done(())),
            Outcome::NeedMore(Need::Open) => Ok(Outcome::NeedMore(Need::Open)),
        }
    }
}

impl Default for Ccp4MapReader {
    fn default() -> Self {
        Ccp4MapReader::new()
    }
}
