use std::io;

use super::EncodingId;

/// A specialized [`Result`](std::result::Result) type for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type of [`EncodedStream`](crate::EncodedStream) operations and of the
/// [`Registry`](crate::Registry).
///
/// Running out of data is *not* an error for the peek-style reads (`get_char`, `gets`,
/// `readpartial`, `sysread`, `read_raw_byte`), which return `Ok(None)` instead. Only the
/// operations documented to fail at the end of the stream report [`Error::EndOfFile`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested encoding is not registered.
    #[error("unknown encoding name - {0}")]
    UnknownEncoding(String),

    /// The mode string given at open time could not be parsed.
    #[error("invalid access mode {0:?}")]
    InvalidMode(String),

    /// No data remains for an operation that does not return an end marker.
    #[error("end of file reached")]
    EndOfFile,

    /// A multi-line read was asked for lines of at most zero bytes, which would never advance.
    #[error("invalid limit: 0 for readlines")]
    ZeroLimit,

    /// A unit read from the stream is malformed in the source encoding of a conversion.
    ///
    /// The offending bytes have been consumed from the stream and are carried here.
    #[error("invalid byte sequence in {encoding}: {bytes:02X?}")]
    InvalidByteSequence { encoding: EncodingId, bytes: Vec<u8> },

    /// A character has no representation in the target encoding of a conversion.
    #[error("{ch:?} from {from} to {to} is undefined")]
    UndefinedConversion {
        ch: char,
        from: EncodingId,
        to: EncodingId,
    },

    /// The underlying byte source failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns a reference to the `Error` value wrapped by a [`std::io::Error`] if it contains
    /// an inner error whose type is `Error`, or returns `None` otherwise.
    ///
    /// This recovers errors that crossed an `io::Error` boundary through
    /// `From<Error> for io::Error`, e.g., when a stream read fails inside a caller's
    /// [`Read`](std::io::Read) implementation built on top of it.
    #[inline]
    pub fn wrapped_in(io_error: &io::Error) -> Option<&Self> {
        match io_error.get_ref() {
            Some(e) => e.downcast_ref::<Self>(),
            None => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        if let Error::Io(e) = value {
            return e;
        }
        let kind = match &value {
            Error::EndOfFile => io::ErrorKind::UnexpectedEof,
            Error::UnknownEncoding(_) | Error::InvalidMode(_) | Error::ZeroLimit => {
                io::ErrorKind::InvalidInput
            }
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, value)
    }
}

/// The error reported by a [`Transcoder`](crate::Transcoder) when it encounters a malformed
/// byte sequence while decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("encountered a malformed byte sequence after {valid_up_to} valid bytes")]
pub struct MalformedError {
    valid_up_to: usize,
}

impl MalformedError {
    /// Creates a new error value.
    pub fn new(valid_up_to: usize) -> Self {
        Self { valid_up_to }
    }

    /// Returns the length of the well-formed prefix of the input.
    #[inline]
    pub fn valid_up_to(&self) -> usize {
        self.valid_up_to
    }
}

/// The error reported by a [`Transcoder`](crate::Transcoder) when it encounters a character
/// that is not mappable in its encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("encountered an unmappable character: {0:?}")]
pub struct UnmappableError(char);

impl UnmappableError {
    /// Creates a new error value.
    pub fn new(unmappable_character: char) -> Self {
        Self(unmappable_character)
    }

    /// Returns the unmappable character value.
    #[inline]
    pub fn value(&self) -> char {
        self.0
    }
}
