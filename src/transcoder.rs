use std::{borrow::Cow, fmt};

use super::{EncodedText, EncodingId, Error, MalformedError, UnmappableError};

/// The reason [`Transcoder::char_boundary_len`] could not measure a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharLenError {
    /// The slice ends before the character does; more bytes are needed to decide.
    NeedMoreBytes,
    /// The slice does not start with a valid character in this encoding.
    Invalid,
}

/// The capability of an encoding consumed by the stream layer.
///
/// A transcoder measures characters at the byte level, which is all the buffered reader needs
/// to split a stream into characters and lines, and converts whole units to and from Unicode
/// when a stream is configured with an internal encoding.
pub trait Transcoder: fmt::Debug + Send + Sync {
    /// Returns the identifier this transcoder is registered under.
    fn id(&self) -> EncodingId;

    /// Returns the minimum number of bytes a character occupies.
    fn min_char_len(&self) -> usize;

    /// Returns the maximum number of bytes a character occupies.
    fn max_char_len(&self) -> usize;

    /// Returns the length of the character at the beginning of `bytes`.
    ///
    /// Implementations must return [`CharLenError::NeedMoreBytes`] only if `bytes` is a proper
    /// prefix of some valid character, which never happens once `bytes` holds `max_char_len`
    /// bytes or more. `bytes` is never empty.
    fn char_boundary_len(&self, bytes: &[u8]) -> Result<usize, CharLenError>;

    /// Returns `true` if bytes `0x00..=0x7F` mean the same as in ASCII and never appear inside a
    /// longer character.
    fn is_ascii_compatible(&self) -> bool;

    /// Decodes a complete unit into Unicode.
    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, MalformedError>;

    /// Encodes Unicode text into this encoding.
    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, UnmappableError>;

    /// Returns `true` if `terminator` can be located by a plain byte search, i.e., a byte-level
    /// match can never start in the middle of a character.
    fn is_byte_searchable(&self, terminator: &[u8]) -> bool {
        self.max_char_len() == 1 || (self.is_ascii_compatible() && terminator.is_ascii())
    }

    /// Returns `true` if `bytes` is a sequence of whole, valid characters.
    fn is_valid(&self, mut bytes: &[u8]) -> bool {
        while !bytes.is_empty() {
            match self.char_boundary_len(bytes) {
                Ok(n) => bytes = &bytes[n..],
                Err(_) => return false,
            }
        }
        true
    }

    /// Converts a unit in this encoding into `target`, tagging the result with the target.
    fn convert(&self, bytes: &[u8], target: &dyn Transcoder) -> Result<EncodedText, Error> {
        if self.id() == target.id() {
            return Ok(EncodedText::new(bytes, target.id()));
        }
        let text = self.decode(bytes).map_err(|_| Error::InvalidByteSequence {
            encoding: self.id(),
            bytes: bytes.to_vec(),
        })?;
        let encoded = target
            .encode(&text)
            .map_err(|e| Error::UndefinedConversion {
                ch: e.value(),
                from: self.id(),
                to: target.id(),
            })?;
        Ok(EncodedText::new(encoded.into_owned(), target.id()))
    }
}
