//! Transcoders for the built-in encodings.
//!
//! The multi-byte legacy encodings take their conversion tables from [`encoding_rs`]; their
//! character boundaries are measured here because `encoding_rs` decodes whole buffers and does
//! not expose them. The single-byte encodings and UTF-8 need no tables.

use std::{borrow::Cow, str};

use encoding_rs::EncoderResult;

use super::{CharLenError, EncodingId, MalformedError, Transcoder, UnmappableError};

/// Uninterpreted bytes (`ASCII-8BIT`). Every byte is a character; only ASCII converts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary;

/// UTF-8 without overlong forms or surrogates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

/// EUC-JP: ASCII, JIS X 0208 pairs, `0x8E`-prefixed half-width kana and `0x8F`-prefixed
/// JIS X 0212 triples.
#[derive(Debug, Clone, Copy, Default)]
pub struct EucJp;

/// Shift_JIS: ASCII, single-byte half-width kana and two-byte JIS X 0208 characters whose trail
/// byte may fall in the ASCII range.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftJis;

/// ISO-8859-1, mapping every byte `N` to `U+00N`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Latin1;

/// 7-bit US-ASCII.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsAscii;

impl Transcoder for Binary {
    fn id(&self) -> EncodingId {
        EncodingId::BINARY
    }

    fn min_char_len(&self) -> usize {
        1
    }

    fn max_char_len(&self) -> usize {
        1
    }

    fn char_boundary_len(&self, _bytes: &[u8]) -> Result<usize, CharLenError> {
        Ok(1)
    }

    fn is_ascii_compatible(&self) -> bool {
        true
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, MalformedError> {
        decode_ascii(bytes)
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, UnmappableError> {
        encode_ascii(text)
    }
}

impl Transcoder for UsAscii {
    fn id(&self) -> EncodingId {
        EncodingId::US_ASCII
    }

    fn min_char_len(&self) -> usize {
        1
    }

    fn max_char_len(&self) -> usize {
        1
    }

    fn char_boundary_len(&self, bytes: &[u8]) -> Result<usize, CharLenError> {
        if bytes[0].is_ascii() {
            Ok(1)
        } else {
            Err(CharLenError::Invalid)
        }
    }

    fn is_ascii_compatible(&self) -> bool {
        true
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, MalformedError> {
        decode_ascii(bytes)
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, UnmappableError> {
        encode_ascii(text)
    }
}

impl Transcoder for Latin1 {
    fn id(&self) -> EncodingId {
        EncodingId::ISO_8859_1
    }

    fn min_char_len(&self) -> usize {
        1
    }

    fn max_char_len(&self) -> usize {
        1
    }

    fn char_boundary_len(&self, _bytes: &[u8]) -> Result<usize, CharLenError> {
        Ok(1)
    }

    fn is_ascii_compatible(&self) -> bool {
        true
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, MalformedError> {
        if bytes.is_ascii() {
            return decode_ascii(bytes);
        }
        Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, UnmappableError> {
        if text.is_ascii() {
            return Ok(Cow::Borrowed(text.as_bytes()));
        }
        text.chars()
            .map(|c| u8::try_from(c).map_err(|_| UnmappableError::new(c)))
            .collect::<Result<Vec<u8>, _>>()
            .map(Cow::Owned)
    }
}

impl Transcoder for Utf8 {
    fn id(&self) -> EncodingId {
        EncodingId::UTF_8
    }

    fn min_char_len(&self) -> usize {
        1
    }

    fn max_char_len(&self) -> usize {
        4
    }

    fn char_boundary_len(&self, bytes: &[u8]) -> Result<usize, CharLenError> {
        let need = match bytes[0] {
            0x00..=0x7f => return Ok(1),
            0xc2..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf4 => 4,
            _ => return Err(CharLenError::Invalid),
        };
        // `from_utf8` tells a truncated sequence (no `error_len`) from an invalid one
        match str::from_utf8(&bytes[..need.min(bytes.len())]) {
            Ok(_) => Ok(need),
            Err(e) if e.error_len().is_none() => Err(CharLenError::NeedMoreBytes),
            Err(_) => Err(CharLenError::Invalid),
        }
    }

    fn is_ascii_compatible(&self) -> bool {
        true
    }

    fn is_byte_searchable(&self, terminator: &[u8]) -> bool {
        // self-synchronizing: a valid sequence can only match at a character start
        str::from_utf8(terminator).is_ok()
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, MalformedError> {
        str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| MalformedError::new(e.valid_up_to()))
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, UnmappableError> {
        Ok(Cow::Borrowed(text.as_bytes()))
    }
}

impl Transcoder for EucJp {
    fn id(&self) -> EncodingId {
        EncodingId::EUC_JP
    }

    fn min_char_len(&self) -> usize {
        1
    }

    fn max_char_len(&self) -> usize {
        3
    }

    fn char_boundary_len(&self, bytes: &[u8]) -> Result<usize, CharLenError> {
        match bytes[0] {
            0x00..=0x7f => Ok(1),
            0x8e => multibyte_len(bytes, 2, |_| 0xa1..=0xdf),
            0x8f => multibyte_len(bytes, 3, |_| 0xa1..=0xfe),
            0xa1..=0xfe => multibyte_len(bytes, 2, |_| 0xa1..=0xfe),
            _ => Err(CharLenError::Invalid),
        }
    }

    fn is_ascii_compatible(&self) -> bool {
        true
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, MalformedError> {
        decode_with(self, encoding_rs::EUC_JP, bytes)
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, UnmappableError> {
        encode_with(encoding_rs::EUC_JP, text)
    }
}

impl Transcoder for ShiftJis {
    fn id(&self) -> EncodingId {
        EncodingId::SHIFT_JIS
    }

    fn min_char_len(&self) -> usize {
        1
    }

    fn max_char_len(&self) -> usize {
        2
    }

    fn char_boundary_len(&self, bytes: &[u8]) -> Result<usize, CharLenError> {
        match bytes[0] {
            0x00..=0x7f | 0xa1..=0xdf => Ok(1),
            0x81..=0x9f | 0xe0..=0xfc => match bytes.get(1) {
                None => Err(CharLenError::NeedMoreBytes),
                Some(0x40..=0x7e | 0x80..=0xfc) => Ok(2),
                Some(_) => Err(CharLenError::Invalid),
            },
            _ => Err(CharLenError::Invalid),
        }
    }

    /// Always `false`: a trail byte can be any of `0x40..=0x7E`, e.g., the second byte of
    /// `0x95 0x5C` is a backslash.
    fn is_ascii_compatible(&self) -> bool {
        false
    }

    fn is_byte_searchable(&self, terminator: &[u8]) -> bool {
        // bytes below 0x40 never occur as a trail byte
        terminator.iter().all(|&b| b < 0x40)
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, MalformedError> {
        decode_with(self, encoding_rs::SHIFT_JIS, bytes)
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, UnmappableError> {
        encode_with(encoding_rs::SHIFT_JIS, text)
    }
}

/// Measures a `need`-byte character whose trail byte at index `i` must fall in `trail(i)`.
fn multibyte_len(
    bytes: &[u8],
    need: usize,
    trail: impl Fn(usize) -> std::ops::RangeInclusive<u8>,
) -> Result<usize, CharLenError> {
    for (i, b) in bytes.iter().enumerate().take(need).skip(1) {
        if !trail(i).contains(b) {
            return Err(CharLenError::Invalid);
        }
    }
    if bytes.len() < need {
        Err(CharLenError::NeedMoreBytes)
    } else {
        Ok(need)
    }
}

/// Returns the length of the longest prefix of `bytes` made of whole valid characters.
fn valid_prefix_len(transcoder: &impl Transcoder, bytes: &[u8]) -> usize {
    let mut pos = 0;
    while pos < bytes.len() {
        match transcoder.char_boundary_len(&bytes[pos..]) {
            Ok(n) => pos += n,
            Err(_) => break,
        }
    }
    pos
}

fn decode_ascii(bytes: &[u8]) -> Result<Cow<'_, str>, MalformedError> {
    match bytes.iter().position(|b| !b.is_ascii()) {
        None => str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| MalformedError::new(e.valid_up_to())),
        Some(pos) => Err(MalformedError::new(pos)),
    }
}

fn encode_ascii(text: &str) -> Result<Cow<'_, [u8]>, UnmappableError> {
    match text.chars().find(|c| !c.is_ascii()) {
        None => Ok(Cow::Borrowed(text.as_bytes())),
        Some(c) => Err(UnmappableError::new(c)),
    }
}

fn decode_with<'a>(
    transcoder: &impl Transcoder,
    encoding: &'static encoding_rs::Encoding,
    bytes: &'a [u8],
) -> Result<Cow<'a, str>, MalformedError> {
    if bytes.is_ascii() {
        return decode_ascii(bytes);
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| MalformedError::new(valid_prefix_len(transcoder, bytes)))
}

fn encode_with<'a>(
    encoding: &'static encoding_rs::Encoding,
    text: &'a str,
) -> Result<Cow<'a, [u8]>, UnmappableError> {
    if text.is_ascii() {
        return Ok(Cow::Borrowed(text.as_bytes()));
    }
    let mut encoder = encoding.new_encoder();
    let mut src = text;
    let mut dst = Vec::new();
    loop {
        let additional = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(src.len() * 4);
        dst.reserve(additional);
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(src, &mut dst, true);
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(Cow::Owned(dst)),
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(c) => return Err(UnmappableError::new(c)),
        }
    }
}
