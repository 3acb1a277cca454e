use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;

use super::{builtin, EncodedText, EncodingId, Error, Result, Transcoder};

static BUILTIN: Lazy<Registry> = Lazy::new(Registry::with_builtins);

/// A table mapping encoding names to [`Transcoder`] capabilities.
///
/// Names and aliases are matched case-insensitively. A registry is consulted when a stream is
/// opened; streams keep the transcoders they resolved and never look them up again.
///
/// # Examples
///
/// ```rust
/// use encoded_io::{EncodingId, Registry};
///
/// let registry = Registry::builtin();
/// assert_eq!(registry.resolve("eucJP")?, EncodingId::EUC_JP);
/// assert_eq!(registry.lookup(EncodingId::UTF_8)?.max_char_len(), 4);
/// assert!(registry.resolve("KLINGON").is_err());
/// # Ok::<(), encoded_io::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct Registry {
    transcoders: HashMap<EncodingId, Arc<dyn Transcoder>>,
    labels: HashMap<String, EncodingId>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in encodings.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::Binary), &["BINARY"]);
        registry.register(Arc::new(builtin::Utf8), &["UTF8", "CP65001"]);
        registry.register(Arc::new(builtin::EucJp), &["eucJP"]);
        registry.register(Arc::new(builtin::ShiftJis), &["SJIS"]);
        registry.register(Arc::new(builtin::Latin1), &["ISO8859-1", "latin1"]);
        registry.register(Arc::new(builtin::UsAscii), &["ASCII", "ANSI_X3.4-1968"]);
        registry
    }

    /// Returns the shared registry of built-in encodings.
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Registers a transcoder under its canonical name and the given aliases, replacing any
    /// transcoder previously registered under the same identifier.
    pub fn register(&mut self, transcoder: Arc<dyn Transcoder>, aliases: &[&str]) -> &mut Self {
        let id = transcoder.id();
        self.labels.insert(id.name().to_ascii_lowercase(), id);
        for alias in aliases {
            self.labels.insert(alias.to_ascii_lowercase(), id);
        }
        self.transcoders.insert(id, transcoder);
        self
    }

    /// Returns the transcoder registered for `id`.
    pub fn lookup(&self, id: EncodingId) -> Result<Arc<dyn Transcoder>> {
        self.transcoders
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::UnknownEncoding(id.name().to_owned()))
    }

    /// Resolves a name or alias to the identifier it is registered under.
    pub fn resolve(&self, label: &str) -> Result<EncodingId> {
        self.labels
            .get(&label.trim().to_ascii_lowercase())
            .copied()
            .ok_or_else(|| Error::UnknownEncoding(label.to_owned()))
    }

    /// Resolves a name or alias straight to its transcoder.
    pub fn lookup_label(&self, label: &str) -> Result<Arc<dyn Transcoder>> {
        self.lookup(self.resolve(label)?)
    }

    /// Converts a text into `target`.
    pub fn convert(&self, text: &EncodedText, target: EncodingId) -> Result<EncodedText> {
        let from = self.lookup(text.encoding())?;
        let to = self.lookup(target)?;
        from.convert(text.as_bytes(), &*to)
    }

    /// Returns `true` if `text` is well-formed in the encoding it is tagged with.
    pub fn validate(&self, text: &EncodedText) -> Result<bool> {
        Ok(self.lookup(text.encoding())?.is_valid(text.as_bytes()))
    }

    /// Returns the canonical names of the registered encodings, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.transcoders.keys().map(|id| id.name()).collect();
        names.sort_unstable();
        names
    }
}
