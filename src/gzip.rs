//! RFC 1952 GZIP member framing around a [`DeflateInflator`]. Mirrors this
//! crate's `Extractor::parse_header` in shape: parse a fixed header, branch
//! on optional flag fields, then hand the body off to the real decoder.
//! Generalized from a single fixed 2-byte block header to gzip's
//! variable-length one.

use crate::chunk_buffer::ChunkBuffer;
use crate::config::Config;
use crate::crc32::Crc32;
use crate::deflate::DeflateInflator;
use crate::error::{raise, try_ready, DensityError, Need, Outcome, Res};

const MAGIC: [u8; 2] = [0x1F, 0x8B];
const DEFLATE_METHOD: u8 = 8;

const FTEXT: u8 = 1 << 0;
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Body,
    Trailer,
    Done,
}

/// Decodes one gzip member into its uncompressed byte stream, verifying the
/// trailer's CRC-32/ISIZE when [`Config`] asks for it.
#[derive(Debug)]
pub struct GzipFramer {
    config: Config,
    stage: Stage,
    inflator: DeflateInflator,
    crc: Crc32,
    decoded_len: u64,
    pending: Vec<u8>,
}

impl GzipFramer {
    pub fn new(config: Config) -> Self {
        GzipFramer {
            config,
            stage: Stage::Header,
            inflator: DeflateInflator::new(),
            crc: Crc32::new(),
            decoded_len: 0,
            pending: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Returns whatever uncompressed bytes have become available since the
    /// last call.
    pub fn drain_decoded(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    pub fn poll(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        loop {
            match self.stage {
                Stage::Header => match self.parse_header(source)? {
                    Outcome::Done(()) => {
                        log::debug!("gzip: header parsed, entering deflate body");
                        self.stage = Stage::Body;
                    }
                    Outcome::NeedMore(need) => return Ok(Outcome::NeedMore(need)),
                },
                Stage::Body => {
                    let outcome = self.inflator.poll(source)?;
                    let decoded = self.inflator.drain_decoded();
                    if !decoded.is_empty() {
                        self.crc.update(&decoded);
                        self.decoded_len = self.decoded_len.wrapping_add(decoded.len() as u64);
                        self.pending.extend(decoded);
                    }
                    match outcome {
                        Outcome::Done(()) => {
                            log::debug!(
                                "gzip: deflate body finished, {} bytes decoded",
                                self.decoded_len
                            );
                            self.stage = Stage::Trailer;
                        }
                        Outcome::NeedMore(need) => return Ok(Outcome::NeedMore(need)),
                    }
                }
                Stage::Trailer => match self.parse_trailer(source)? {
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

    /// Parses the fixed header plus any optional fields. On underflow the
    /// source cursor is rewound to where the header started, so the whole
    /// header is re-parsed on the next call rather than resuming mid-field.
    fn parse_header(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        let checkpoint = source.checkpoint();
        match self.try_parse_header(source) {
            Ok(Outcome::NeedMore(need)) => {
                source.restore(checkpoint);
                Outcome::NeedMore(need).fatal_on_closed()
            }
            other => other,
        }
    }

    fn try_parse_header(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        let fixed = try_ready!(source.try_take(10));
        if fixed[0..2] != MAGIC {
            return raise(DensityError::InvalidGzipSignature {
                found: [fixed[0], fixed[1]],
            });
        }
        let method = fixed[2];
        if method != DEFLATE_METHOD {
            return raise(DensityError::UnsupportedCompressionMethod { method });
        }
        let flags = fixed[3];
        log::trace!("gzip header: flags={flags:#04x}");

        if flags & FEXTRA != 0 {
            let xlen = try_ready!(source.try_take(2));
            let xlen = u16::from_le_bytes([xlen[0], xlen[1]]) as usize;
            try_ready!(source.try_take(xlen));
        }
        if flags & FNAME != 0 {
            try_ready!(self.skip_cstring(source));
        }
        if flags & FCOMMENT != 0 {
            try_ready!(self.skip_cstring(source));
        }
        if flags & FHCRC != 0 {
            try_ready!(source.try_take(2));
        }
        Ok(Outcome::Done(()))
    }

    /// Consumes bytes up to and including a NUL terminator.
    fn skip_cstring(&self, source: &mut ChunkBuffer) -> Outcome<()> {
        loop {
            match source.next_byte() {
                Outcome::Done(0) => return Outcome::Done(()),
                Outcome::Done(_) => continue,
                Outcome::NeedMore(need) => return Outcome::NeedMore(need),
            }
        }
    }

    fn parse_trailer(&mut self, source: &mut ChunkBuffer) -> Res<Outcome<()>> {
        let checkpoint = source.checkpoint();
        let bytes = match source.try_take(8) {
            Outcome::Done(b) => b,
            Outcome::NeedMore(need) => {
                source.restore(checkpoint);
                return match need {
                    Need::Closed => raise(DensityError::Truncated),
                    Need::Open => Ok(Outcome::NeedMore(need)),
                };
            }
        };
        let crc32 = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let isize_ = u32::from_le_bytes(bytes[4..8].try_into().unwrap());

        if self.config.verify_crc {
            let actual = self.crc.finalize();
            if actual != crc32 {
                return raise(DensityError::BadCrc {
                    expected: crc32,
                    actual,
                });
            }
        }
        if self.config.verify_isize {
            let actual = (self.decoded_len & 0xFFFF_FFFF) as u32;
            if actual != isize_ {
                return raise(DensityError::BadIsize {
                    expected: isize_,
                    actual,
                });
            }
        }
        Ok(Outcome::Done(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_deflate_member(payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0b001u8];
        body.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        body.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
        body.extend_from_slice(payload);
        body
    }

    fn gzip_member(payload: &[u8]) -> Vec<u8> {
        let mut crc = Crc32::new();
        crc.update(payload);
        let mut out = vec![0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF];
        out.extend(stored_deflate_member(payload));
        out.extend_from_slice(&crc.finalize().to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out
    }

    fn verifying_config() -> Config {
        Config {
            verify_crc: true,
            verify_isize: true,
            ..Config::default()
        }
    }

    #[test_log::test]
    fn decodes_minimal_member() {
        let bytes = gzip_member(b"hello, gzip");
        let mut source = ChunkBuffer::new();
        source.append(&bytes);
        source.close_end();
        let mut framer = GzipFramer::new(verifying_config());
        loop {
            match framer.poll(&mut source).unwrap() {
                Outcome::Done(()) => break,
                Outcome::NeedMore(_) => panic!("unexpected suspension"),
            }
        }
        assert_eq!(framer.drain_decoded(), b"hello, gzip");
    }

    #[test_log::test]
    fn rejects_bad_signature() {
        let mut bytes = gzip_member(b"x");
        bytes[0] = 0x00;
        let mut source = ChunkBuffer::new();
        source.append(&bytes);
        source.close_end();
        let mut framer = GzipFramer::new(verifying_config());
        assert!(framer.poll(&mut source).is_err());
    }

    #[test_log::test]
    fn rejects_crc_mismatch() {
        let mut bytes = gzip_member(b"hello, gzip");
        let last = bytes.len() - 5;
        bytes[last] ^= 0xFF;
        let mut source = ChunkBuffer::new();
        source.append(&bytes);
        source.close_end();
        let mut framer = GzipFramer::new(verifying_config());
        let mut result = Ok(Outcome::Done(()));
        loop {
            result = framer.poll(&mut source);
            match result {
                Ok(Outcome::Done(())) | Err(_) => break,
                Ok(Outcome::NeedMore(_)) => panic!("unexpected suspension"),
            }
        }
        assert!(result.is_err());
    }

    #[test_log::test]
    fn skips_verification_when_disabled() {
        let mut bytes = gzip_member(b"hello, gzip");
        let last = bytes.len() - 5;
        bytes[last] ^= 0xFF;
        let mut source = ChunkBuffer::new();
        source.append(&bytes);
        source.close_end();
        let mut framer = GzipFramer::new(Config::default());
        loop {
            match framer.poll(&mut source).unwrap() {
                Outcome::Done(()) => break,
                Outcome::NeedMore(_) => panic!("unexpected suspension"),
            }
        }
    }

    #[test_log::test]
    fn resumes_across_header_chunk_boundary() {
        let bytes = gzip_member(b"chunked");
        let mut source = ChunkBuffer::new();
        let mut framer = GzipFramer::new(Config::default());
        for (i, chunk) in bytes.chunks(3).enumerate() {
            source.append(chunk);
            if (i + 1) * 3 >= bytes.len() {
                source.close_end();
            }
            let _ = framer.poll(&mut source);
        }
        assert_eq!(framer.drain_decoded(), b"chunked");
        assert!(framer.is_finished());
    }
}
