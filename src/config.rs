use super::{EncodingId, Error, Registry, Result};

/// The encodings a stream is opened with, parsed once from a mode string.
///
/// The accepted forms are `"ext"` and `"ext:int"`, optionally preceded by a read access mode
/// (`"r"`, `"rb"` or `"rt"`), e.g. `"r:EUC-JP:UTF-8"`. A bare `"rb"` opens the stream as binary.
/// An internal encoding of `"-"`, or one equal to the external encoding, means no conversion.
///
/// # Examples
///
/// ```rust
/// use encoded_io::{EncodingId, Registry, StreamConfig};
///
/// let config = StreamConfig::parse("r:iso-8859-1:utf-8", Registry::builtin())?;
/// assert_eq!(config.external, EncodingId::ISO_8859_1);
/// assert_eq!(config.internal, Some(EncodingId::UTF_8));
///
/// let config = StreamConfig::parse("Shift_JIS", Registry::builtin())?;
/// assert_eq!(config.internal, None);
/// # Ok::<(), encoded_io::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// The encoding of the bytes in the source.
    pub external: EncodingId,
    /// The encoding textual reads are converted into, if any.
    pub internal: Option<EncodingId>,
}

impl StreamConfig {
    /// Creates a configuration, dropping an internal encoding equal to the external one.
    pub fn new(external: EncodingId, internal: Option<EncodingId>) -> Self {
        Self {
            external,
            internal: internal.filter(|&id| id != external),
        }
    }

    /// Creates a configuration for uninterpreted bytes.
    pub fn binary() -> Self {
        Self::new(EncodingId::BINARY, None)
    }

    /// Parses a mode string, resolving the encoding names against `registry`.
    pub fn parse(mode: &str, registry: &Registry) -> Result<Self> {
        let invalid = || Error::InvalidMode(mode.to_owned());
        let mut parts = mode.split(':').map(str::trim);

        let mut first = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let binmode = match first {
            "r" | "rt" => Some(false),
            "rb" => Some(true),
            // write and update modes are not supported
            _ if is_access_mode(first) => return Err(invalid()),
            _ => None,
        };
        if let Some(binmode) = binmode {
            match parts.next() {
                Some(ext) => first = ext,
                None if binmode => return Ok(Self::binary()),
                None => return Err(invalid()),
            }
        }

        let external = registry.resolve(first)?;
        let internal = match parts.next() {
            None | Some("-") => None,
            Some(name) => Some(registry.resolve(name)?),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(external, internal))
    }
}

fn is_access_mode(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some('r' | 'w' | 'a'))
        && s.len() <= 3
        && chars.all(|c| matches!(c, 'b' | 't' | '+'))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::StreamConfig;
    use crate::{EncodingId, Error, Registry};

    #[rstest]
    #[case("UTF-8", EncodingId::UTF_8, None)]
    #[case("r:EUC-JP", EncodingId::EUC_JP, None)]
    #[case("rt:sjis", EncodingId::SHIFT_JIS, None)]
    #[case("rb:ASCII-8BIT", EncodingId::BINARY, None)]
    #[case("rb", EncodingId::BINARY, None)]
    #[case("r:iso-8859-1:utf-8", EncodingId::ISO_8859_1, Some(EncodingId::UTF_8))]
    #[case("EUC-JP:Shift_JIS", EncodingId::EUC_JP, Some(EncodingId::SHIFT_JIS))]
    #[case("r:UTF-8:-", EncodingId::UTF_8, None)]
    #[case("r:utf-8:UTF8", EncodingId::UTF_8, None)]
    fn parses(
        #[case] mode: &str,
        #[case] external: EncodingId,
        #[case] internal: Option<EncodingId>,
    ) {
        let config = StreamConfig::parse(mode, Registry::builtin()).unwrap();
        assert_eq!(config, StreamConfig { external, internal });
    }

    #[rstest]
    #[case("")]
    #[case("r")]
    #[case("w:UTF-8")]
    #[case("r+:UTF-8")]
    #[case("ab")]
    #[case("r:UTF-8:EUC-JP:Shift_JIS")]
    #[case(":UTF-8")]
    fn rejects_bad_modes(#[case] mode: &str) {
        assert!(matches!(
            StreamConfig::parse(mode, Registry::builtin()),
            Err(Error::InvalidMode(m)) if m == mode
        ));
    }

    #[test]
    fn rejects_unknown_encodings() {
        assert!(matches!(
            StreamConfig::parse("r:UTF-8:KOI8-Z", Registry::builtin()),
            Err(Error::UnknownEncoding(name)) if name == "KOI8-Z"
        ));
    }
}
