//! Wires the decode pipeline: an external byte producer feeds a
//! [`ChunkBuffer`], which a [`GzipFramer`] drains into decoded bytes that a
//! [`Ccp4MapReader`] consumes into a [`DensityMap`]. Generalizes a blocking
//! `Read`-pull driver (pulls from a `std::io::Read` to completion) into a
//! push/resume model driven by whatever cadence the caller's chunk producer
//! delivers at.

use crate::ccp4::Ccp4MapReader;
use crate::chunk_buffer::ChunkBuffer;
use crate::config::Config;
use crate::density::DensityMap;
use crate::error::{Outcome, Res};
use crate::gzip::GzipFramer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Decoding,
    Done,
}

/// Drives the gzip/deflate layer and the CCP4 reader from a stream of input
/// chunks. Owns the two intermediate buffers (`compressed` and the decoded
/// byte relay) so a caller only ever has to call [`Self::push_chunk`] and
/// [`Self::finish`].
#[derive(Debug)]
pub struct Orchestrator {
    stage: Stage,
    compressed: ChunkBuffer,
    decoded: ChunkBuffer,
    gzip: GzipFramer,
    map_reader: Ccp4MapReader,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Orchestrator {
            stage: Stage::Decoding,
            compressed: ChunkBuffer::new(),
            decoded: ChunkBuffer::new(),
            gzip: GzipFramer::new(config),
            map_reader: Ccp4MapReader::new(),
        }
    }

    /// Appends a chunk of compressed input and drives the pipeline as far
    /// as it will go. Returns `Done` once the whole `DensityMap` is ready,
    /// or `NeedMore` once every layer has suspended on the same underflow.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Res<Outcome<()>> {
        self.compressed.append(chunk);
        self.drive()
    }

    /// Latches end-of-input. Call once the producer has no more chunks.
    /// After this, `NeedMore(Need::Open)` can no longer occur: any further
    /// underflow is `NeedMore(Need::Closed)`, which the decoders turn into a
    /// fatal `Truncated` at their next opportunity.
    pub fn finish(&mut self) -> Res<Outcome<()>> {
        self.compressed.close_end();
        self.drive()
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Advances gzip decode then map parsing, once each. Each layer's own
    /// `poll` already loops internally until it has squeezed every byte it
    /// can out of what is currently buffered, so a single pass through both
    /// layers here is always enough to reach the next genuine underflow.
    /// `Need::Closed` never reaches this point as a plain `NeedMore`, since
    /// every layer below converts it to a fatal `Truncated` the moment the
    /// stream it reads from is both closed and short.
    fn drive(&mut self) -> Res<Outcome<()>> {
        if self.stage == Stage::Done {
            return Ok(Outcome::Done(()));
        }

        self.gzip.poll(&mut self.compressed)?;
        let decoded = self.gzip.drain_decoded();
        if !decoded.is_empty() {
            self.decoded.append(&decoded);
        }
        if self.gzip.is_finished() {
            self.decoded.close_end();
        }

        let reader_outcome = self.map_reader.poll(&mut self.decoded)?;
        if self.map_reader.is_finished() {
            self.stage = Stage::Done;
            return Ok(Outcome::Done(()));
        }

        match reader_outcome {
            Outcome::NeedMore(need) => Ok(Outcome::NeedMore(need)),
            Outcome::Done(()) => {
                unreachable!("map reader reported done without is_finished() set")
            }
        }
    }

    /// Consumes the orchestrator, returning the finished map. Panics if
    /// called before [`Self::is_finished`].
    pub fn into_density_map(self) -> DensityMap {
        assert!(self.is_finished(), "map not fully decoded yet");
        self.map_reader.into_density_map()
    }
}
