use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::Location;

/// Every fatal failure mode named in the error taxonomy. `NeedMore` underflow
/// is deliberately not a variant here: it is recoverable and modeled by
/// [`Outcome`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum DensityError {
    /// The stream ended before all required bytes/bits were available, and
    /// the producer has signalled there is no more data coming.
    Truncated,
    InvalidGzipSignature { found: [u8; 2] },
    UnsupportedCompressionMethod { method: u8 },
    InvalidDeflateBlock { reason: &'static str },
    InvalidHuffmanSymbol { symbol: u16, max: u16 },
    BadCcp4Magic { found: u32 },
    UnsupportedMode { mode: i32 },
    SizeMismatch { expected: u64, actual: u64 },
    SymmetryMisalignment { nsymbt: i32 },
    BadSymmetryOperator { text: String, reason: &'static str },
    SymmetryExpansionUnsupported,
    BadCrc { expected: u32, actual: u32 },
    BadIsize { expected: u32, actual: u32 },
}

/// A `DensityError` tagged with the call site that raised it, mirroring the
/// message/context/location triple this crate's lineage has always attached
/// to fatal errors.
#[derive(Debug, Clone)]
pub struct DataError {
    pub kind: DensityError,
    pub context: Option<String>,
    pub location: &'static Location<'static>,
}

pub type Res<T> = Result<T, DataError>;

impl DataError {
    #[track_caller]
    pub fn new(kind: DensityError) -> Self {
        DataError {
            kind,
            context: None,
            location: Location::caller(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.kind, self.location)?;
        if let Some(context) = &self.context {
            write!(f, " ({context})")?;
        }
        Ok(())
    }
}

impl Error for DataError {}

impl Display for DensityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DensityError::Truncated => write!(f, "stream ended before all required data arrived"),
            DensityError::InvalidGzipSignature { found } => {
                write!(f, "invalid gzip signature {found:02X?}, expected [1F, 8B]")
            }
            DensityError::UnsupportedCompressionMethod { method } => {
                write!(
                    f,
                    "unsupported gzip compression method {method}, expected 8 (deflate)"
                )
            }
            DensityError::InvalidDeflateBlock { reason } => {
                write!(f, "invalid deflate block: {reason}")
            }
            DensityError::InvalidHuffmanSymbol { symbol, max } => {
                write!(f, "huffman symbol {symbol} exceeds maximum {max}")
            }
            DensityError::BadCcp4Magic { found } => {
                write!(f, "bad CCP4 MAP magic 0x{found:08X}, expected 0x2050414D")
            }
            DensityError::UnsupportedMode { mode } => {
                write!(
                    f,
                    "unsupported CCP4 storage mode {mode}, only 0 and 2 are supported"
                )
            }
            DensityError::SizeMismatch { expected, actual } => {
                write!(
                    f,
                    "CCP4 size mismatch: header implies {expected} bytes, stream has {actual}"
                )
            }
            DensityError::SymmetryMisalignment { nsymbt } => {
                write!(f, "NSYMBT {nsymbt} is not a multiple of 4")
            }
            DensityError::BadSymmetryOperator { text, reason } => {
                write!(f, "bad symmetry operator {text:?}: {reason}")
            }
            DensityError::SymmetryExpansionUnsupported => {
                write!(f, "symmetry expansion is not implemented")
            }
            DensityError::BadCrc { expected, actual } => {
                write!(
                    f,
                    "gzip CRC32 mismatch: trailer says {expected:08X}, computed {actual:08X}"
                )
            }
            DensityError::BadIsize { expected, actual } => {
                write!(f, "gzip ISIZE mismatch: trailer says {expected}, decoded {actual}")
            }
        }
    }
}

/// Attaches a human-readable breadcrumb to a fatal error without threading a
/// builder struct through every call site.
pub(crate) trait WithContext<T> {
    fn ctx(self, context: impl FnOnce() -> String) -> Res<T>;
}

impl<T> WithContext<T> for Res<T> {
    fn ctx(self, context: impl FnOnce() -> String) -> Res<T> {
        self.map_err(|e| e.with_context(context()))
    }
}

#[track_caller]
pub(crate) fn raise<T>(kind: DensityError) -> Res<T> {
    log::error!("{kind}");
    Err(DataError::new(kind))
}

/// The outcome of a possibly-suspending decode step. `NeedMore` is not an
/// error: it tells the orchestrator to wait for more input and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    /// The stream may still produce more bytes; suspend and retry later.
    Open,
    /// The producer has latched end-of-stream; no more bytes will ever come.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    NeedMore(Need),
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(t) => Outcome::Done(f(t)),
            Outcome::NeedMore(n) => Outcome::NeedMore(n),
        }
    }

    /// Turns a closed-stream underflow into the fatal `Truncated` error,
    /// leaving an open-stream underflow as a recoverable suspension.
    #[track_caller]
    pub fn fatal_on_closed(self) -> Result<Outcome<T>, DataError> {
        match self {
            Outcome::NeedMore(Need::Closed) => raise(DensityError::Truncated),
            other => Ok(other),
        }
    }
}

/// `try_ready!(outcome)` either binds the inner value or returns the
/// wrapping function early with the not-ready outcome. Same shape as the `?`
/// operator, applied to `Outcome` rather than `Result`.
macro_rules! try_ready {
    ($outcome:expr) => {
        match $outcome {
            $crate::error::Outcome::Done(v) => v,
            $crate::error::Outcome::NeedMore(n) => {
                return Ok($crate::error::Outcome::NeedMore(n))
            }
        }
    };
}

pub(crate) use try_ready;
