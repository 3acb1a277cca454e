use std::fmt;

/// An identifier of a registered encoding.
///
/// Identifiers are lightweight copyable handles holding the canonical name of an encoding and
/// are compared by that name. The behavior of an encoding lives in its
/// [`Transcoder`](crate::Transcoder), which the [`Registry`](crate::Registry) resolves from an
/// identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodingId(&'static str);

impl EncodingId {
    /// Uninterpreted bytes. Raw reads are always tagged with this encoding.
    pub const BINARY: Self = Self("ASCII-8BIT");
    pub const UTF_8: Self = Self("UTF-8");
    pub const EUC_JP: Self = Self("EUC-JP");
    pub const SHIFT_JIS: Self = Self("Shift_JIS");
    pub const ISO_8859_1: Self = Self("ISO-8859-1");
    pub const US_ASCII: Self = Self("US-ASCII");

    /// Creates an identifier for a plug-in encoding.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the canonical name of the encoding.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.0
    }

    /// Returns `true` if this is the uninterpreted binary encoding.
    #[inline]
    pub fn is_binary(&self) -> bool {
        *self == Self::BINARY
    }
}

impl fmt::Debug for EncodingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<Encoding:{}>", self.0)
    }
}

impl fmt::Display for EncodingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
