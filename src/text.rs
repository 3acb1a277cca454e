use std::{fmt, str};

use bstr::BStr;

use super::EncodingId;

/// An immutable byte sequence tagged with the encoding it is to be interpreted in.
///
/// Two values are equal only if both the bytes and the encodings match; there is no implicit
/// equality across encodings, so `"abc"` tagged UTF-8 differs from `"abc"` tagged EUC-JP.
///
/// The bytes are not validated on construction. A stream that meets a malformed unit keeps going
/// and hands the unit out tagged with its encoding, so a text may be ill-formed; use
/// [`Transcoder::is_valid`](crate::Transcoder::is_valid) to check.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedText {
    bytes: Vec<u8>,
    encoding: EncodingId,
}

impl EncodedText {
    pub fn new(bytes: impl Into<Vec<u8>>, encoding: EncodingId) -> Self {
        Self {
            bytes: bytes.into(),
            encoding,
        }
    }

    /// Creates a text tagged as uninterpreted binary.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, EncodingId::BINARY)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[inline]
    pub fn encoding(&self) -> EncodingId {
        self.encoding
    }

    /// Returns the length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_ascii(&self) -> bool {
        self.bytes.is_ascii()
    }

    /// Returns the same bytes retagged with another encoding, without any conversion.
    pub fn force_encoding(self, encoding: EncodingId) -> Self {
        Self { encoding, ..self }
    }

    /// Returns the content as a string slice if the text is tagged UTF-8 (or is pure ASCII in
    /// an ASCII-compatible tag) and is well-formed.
    pub fn to_str(&self) -> Option<&str> {
        if self.encoding == EncodingId::UTF_8 || self.is_ascii() {
            str::from_utf8(&self.bytes).ok()
        } else {
            None
        }
    }

    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.bytes.ends_with(suffix)
    }
}

impl fmt::Debug for EncodedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.force_encoding({:?})", BStr::new(&self.bytes), self.encoding.name())
    }
}

impl From<&str> for EncodedText {
    fn from(value: &str) -> Self {
        Self::new(value, EncodingId::UTF_8)
    }
}

impl From<String> for EncodedText {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes(), EncodingId::UTF_8)
    }
}

impl AsRef<[u8]> for EncodedText {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq<[u8]> for EncodedText {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for EncodedText {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.bytes == other
    }
}

#[cfg(test)]
mod tests {
    use super::{EncodedText, EncodingId};

    #[test]
    fn equality_requires_same_encoding() {
        let a = EncodedText::new(*b"abc", EncodingId::UTF_8);
        let b = EncodedText::new(*b"abc", EncodingId::EUC_JP);
        assert_ne!(a, b);
        assert_eq!(a, b.clone().force_encoding(EncodingId::UTF_8));
        assert_eq!(a, *b"abc");
        assert_eq!(b.encoding(), EncodingId::EUC_JP);
    }

    #[test]
    fn debug_shows_bytes_and_encoding() {
        let t = EncodedText::new(vec![b'a', 0xb0, 0xa1, b'\n'], EncodingId::EUC_JP);
        assert_eq!(format!("{:?}", t), r#""a\xb0\xa1\n".force_encoding("EUC-JP")"#);
    }

    #[test]
    fn to_str() {
        assert_eq!(EncodedText::from("h\u{e9}").to_str(), Some("h\u{e9}"));
        assert_eq!(EncodedText::binary(*b"abc").to_str(), Some("abc"));
        assert_eq!(EncodedText::binary(vec![0xc3, 0xa9]).to_str(), None);
        assert_eq!(EncodedText::new(vec![0xff], EncodingId::UTF_8).to_str(), None);
    }
}
