//! Encoding-aware buffered stream reader
//!
//! This crate reads a byte stream as text of a declared encoding. An [`EncodedStream`] pulls
//! bytes from any [`std::io::Read`] implementation (or any [`ByteSource`]), splits them into
//! characters and lines according to the stream's *external* encoding, and returns them as
//! [`EncodedText`] values tagged with that encoding, or converted into an *internal* encoding
//! if one is configured.
//!
//! ```no_run
//! use encoded_io::{EncodedStream, EncodingId};
//!
//! let mut stream = EncodedStream::open("foo.txt", "r:Shift_JIS:UTF-8")?;
//! while let Some(line) = stream.gets()? {
//!     assert_eq!(line.encoding(), EncodingId::UTF_8);
//!     print!("{}", line.to_str().unwrap_or_default());
//! }
//! stream.close()?;
//! # Ok::<(), encoded_io::Error>(())
//! ```
//!
//! Raw reads on the same stream, such as [`read_bytes`], [`read_raw_byte`] and
//! [`readpartial`], share the cursor with the textual reads and always return bytes tagged
//! [`EncodingId::BINARY`].
//!
//! ```rust
//! use encoded_io::{EncodedStream, EncodingId};
//!
//! let mut stream = EncodedStream::from_mode(&b"\xc2\xa1\n"[..], "EUC-JP")?;
//! let raw = stream.read_bytes(1)?.unwrap();
//! assert_eq!((raw.as_bytes(), raw.encoding()), (&b"\xc2"[..], EncodingId::BINARY));
//! let rest = stream.gets()?.unwrap();
//! assert_eq!((rest.as_bytes(), rest.encoding()), (&b"\xa1\n"[..], EncodingId::EUC_JP));
//! # Ok::<(), encoded_io::Error>(())
//! ```
//!
//! Encodings are looked up in a [`Registry`] of [`Transcoder`] capabilities. The built-in
//! registry knows `ASCII-8BIT` (binary), `UTF-8`, `EUC-JP`, `Shift_JIS`, `ISO-8859-1` and
//! `US-ASCII`; more can be plugged in by implementing `Transcoder`.
//!
//! [`read_bytes`]: EncodedStream::read_bytes
//! [`read_raw_byte`]: EncodedStream::read_raw_byte
//! [`readpartial`]: EncodedStream::readpartial

#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod encoding;
mod error;
mod registry;
mod source;
mod stream;
mod text;
mod transcoder;

mod buffer;
pub mod builtin;

pub use config::StreamConfig;
pub use encoding::EncodingId;
pub use error::{Error, MalformedError, Result, UnmappableError};
pub use registry::Registry;
pub use source::ByteSource;
pub use stream::{open, Bytes, Chars, EncodedStream, LineOptions, Lines, Separator};
pub use text::EncodedText;
pub use transcoder::{CharLenError, Transcoder};

#[cfg(test)]
mod tests;
