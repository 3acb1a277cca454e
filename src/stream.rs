use std::{borrow::Cow, fs, io, iter::FusedIterator, path::Path, ptr, sync::Arc};

use super::{
    buffer::{BufferedDecoder, DEFAULT_BUF_SIZE},
    builtin, ByteSource, EncodedText, EncodingId, Error, Registry, Result, StreamConfig,
    Transcoder,
};

/// A buffered reader that splits a byte stream into characters and lines of a declared
/// encoding.
///
/// A stream is bound to an *external* encoding, the encoding of the bytes in the source, and
/// optionally to an *internal* encoding. Textual reads ([`get_char`], [`gets`] and friends,
/// [`read`]) return text tagged with the external encoding as it is, or converted into and
/// tagged with the internal encoding if one is configured. Raw reads ([`read_raw_byte`],
/// [`read_bytes`], [`readpartial`], [`sysread`]) always return uninterpreted bytes tagged
/// [`EncodingId::BINARY`], whatever the stream's encodings are.
///
/// All reads except [`sysread`] share one buffer and one cursor, so textual and raw reads can be
/// interleaved without losing or repeating a byte.
///
/// A byte sequence that is not valid in the external encoding does not stop a textual read:
/// the offending byte is handed out as a character of its own, tagged with the external
/// encoding. Only when the stream converts into an internal encoding does such a unit fail the
/// read with [`Error::InvalidByteSequence`], which carries the consumed bytes.
///
/// [`get_char`]: Self::get_char
/// [`gets`]: Self::gets
/// [`read`]: Self::read
/// [`read_raw_byte`]: Self::read_raw_byte
/// [`read_bytes`]: Self::read_bytes
/// [`readpartial`]: Self::readpartial
/// [`sysread`]: Self::sysread
///
/// # Examples
///
/// ```rust
/// use encoded_io::{EncodedStream, EncodingId};
///
/// let src: &[u8] = b"\xc6\xfc\xcb\xdc\n\xb8\xec\n";
/// let mut stream = EncodedStream::from_mode(src, "r:EUC-JP:UTF-8")?;
///
/// let line = stream.gets()?.unwrap();
/// assert_eq!(line.encoding(), EncodingId::UTF_8);
/// assert_eq!(line.to_str(), Some("日本\n"));
///
/// let byte = stream.read_raw_byte()?.unwrap();
/// assert_eq!(byte.encoding(), EncodingId::BINARY);
/// assert_eq!(byte.as_bytes(), b"\xb8");
/// # Ok::<(), encoded_io::Error>(())
/// ```
#[derive(Debug)]
pub struct EncodedStream<S> {
    decoder: BufferedDecoder<S>,
    external: Arc<dyn Transcoder>,
    internal: Option<Arc<dyn Transcoder>>,
    /// `"\n"` in the external encoding.
    newline: Vec<u8>,
    lineno: u64,
    /// Where separators and pushed-back text in a third encoding are resolved.
    registry: Cow<'static, Registry>,
}

/// What ends a line read by [`EncodedStream::gets_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Separator {
    /// A newline in the external encoding.
    #[default]
    Newline,
    /// The given text. Unless tagged with the external encoding or binary, it is converted into
    /// the external encoding before matching. An empty text means [`Separator::Paragraph`].
    Custom(EncodedText),
    /// One or more empty lines. Leading newlines are skipped and the newlines following a
    /// paragraph are swallowed.
    Paragraph,
    /// Nothing: the line runs to the end of the stream (or to the limit).
    All,
}

/// Options for the line-oriented reads.
///
/// # Examples
///
/// ```rust
/// use encoded_io::{EncodedStream, LineOptions};
///
/// let mut stream = EncodedStream::from_mode(&b"a,b,c"[..], "US-ASCII")?;
/// let fields = stream.readlines_with(LineOptions::new().separator(",").chomp(true))?;
/// assert_eq!(fields.len(), 3);
/// assert_eq!(fields[2].as_bytes(), b"c");
/// # Ok::<(), encoded_io::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOptions {
    pub separator: Separator,
    /// Upper bound in bytes, extended to the end of the character it falls in.
    pub limit: Option<usize>,
    /// Whether to strip the separator from the returned line.
    pub chomp: bool,
}

impl LineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn separator(mut self, separator: impl Into<EncodedText>) -> Self {
        self.separator = Separator::Custom(separator.into());
        self
    }

    pub fn paragraph(mut self) -> Self {
        self.separator = Separator::Paragraph;
        self
    }

    pub fn all(mut self) -> Self {
        self.separator = Separator::All;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn chomp(mut self, chomp: bool) -> Self {
        self.chomp = chomp;
        self
    }
}

impl<S: ByteSource> EncodedStream<S> {
    /// Creates a new stream over `source`, resolving the configured encodings in `registry`.
    pub fn new(source: S, config: &StreamConfig, registry: &Registry) -> Result<Self> {
        Self::with_capacity(DEFAULT_BUF_SIZE, source, config, registry)
    }

    /// Creates a new stream that pulls at least `capacity` bytes from `source` at a time.
    pub fn with_capacity(
        capacity: usize,
        source: S,
        config: &StreamConfig,
        registry: &Registry,
    ) -> Result<Self> {
        let external = registry.lookup(config.external)?;
        let internal = config
            .internal
            .map(|id| registry.lookup(id))
            .transpose()?;
        let builtin = Registry::builtin();
        let registry = if ptr::eq(registry, builtin) {
            Cow::Borrowed(builtin)
        } else {
            Cow::Owned(registry.clone())
        };
        Ok(Self::from_transcoders(
            capacity, source, external, internal, registry,
        ))
    }

    /// Creates a new stream from a mode string such as `"r:EUC-JP:UTF-8"`, resolved against the
    /// built-in encodings.
    pub fn from_mode(source: S, mode: &str) -> Result<Self> {
        let registry = Registry::builtin();
        Self::new(source, &StreamConfig::parse(mode, registry)?, registry)
    }

    /// Creates a new stream that reads uninterpreted bytes.
    pub fn binary(source: S) -> Self {
        Self::from_transcoders(
            DEFAULT_BUF_SIZE,
            source,
            Arc::new(builtin::Binary),
            None,
            Cow::Borrowed(Registry::builtin()),
        )
    }

    fn from_transcoders(
        capacity: usize,
        source: S,
        external: Arc<dyn Transcoder>,
        internal: Option<Arc<dyn Transcoder>>,
        registry: Cow<'static, Registry>,
    ) -> Self {
        let internal = internal.filter(|t| t.id() != external.id());
        let newline = external
            .encode("\n")
            .map_or_else(|_| b"\n".to_vec(), Cow::into_owned);
        Self {
            decoder: BufferedDecoder::with_capacity(capacity, source),
            external,
            internal,
            newline,
            lineno: 0,
            registry,
        }
    }

    pub fn external_encoding(&self) -> EncodingId {
        self.external.id()
    }

    pub fn internal_encoding(&self) -> Option<EncodingId> {
        self.internal.as_ref().map(|t| t.id())
    }

    /// Returns a reference to the underlying byte source.
    pub fn get_ref(&self) -> &S {
        self.decoder.source_ref()
    }

    /// Returns the underlying byte source and any bytes buffered but not yet read.
    pub fn into_inner(self) -> (S, Vec<u8>) {
        self.decoder.into_parts()
    }

    /// Closes the underlying byte source and drops the stream.
    pub fn close(mut self) -> io::Result<()> {
        log::debug!("closing stream at offset {}", self.decoder.offset());
        self.decoder.close()
    }

    /// Returns the number of lines read by the line-oriented operations so far.
    pub fn lineno(&self) -> u64 {
        self.lineno
    }

    /// Returns the number of bytes consumed from the stream so far.
    pub fn pos(&self) -> u64 {
        self.decoder.offset()
    }

    /// Returns `true` if nothing is left to read, pulling from the source if necessary.
    pub fn eof(&mut self) -> Result<bool> {
        Ok(self.decoder.at_eof()?)
    }

    /// Reads the next character, or returns `None` at the end of the stream.
    pub fn get_char(&mut self) -> Result<Option<EncodedText>> {
        match self.decoder.next_char(&*self.external)? {
            Some(unit) => self.tag(unit).map(Some),
            None => Ok(None),
        }
    }

    /// Reads the next character, failing with [`Error::EndOfFile`] at the end of the stream.
    pub fn read_char(&mut self) -> Result<EncodedText> {
        self.get_char()?.ok_or(Error::EndOfFile)
    }

    /// Reads the next byte as a one-byte binary text, regardless of the stream's encodings.
    pub fn read_raw_byte(&mut self) -> Result<Option<EncodedText>> {
        Ok(self.get_byte()?.map(|b| EncodedText::binary(vec![b])))
    }

    pub fn get_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.decoder.next_byte()?)
    }

    /// Reads the next line including its newline, or returns `None` at the end of the stream.
    pub fn gets(&mut self) -> Result<Option<EncodedText>> {
        self.gets_with(&LineOptions::default())
    }

    /// Reads the next line as specified by `options`.
    ///
    /// The separator is matched at the byte level in the external encoding, only at character
    /// boundaries. A last line without a separator is returned as it is.
    pub fn gets_with(&mut self, options: &LineOptions) -> Result<Option<EncodedText>> {
        let Self {
            decoder,
            external,
            internal,
            newline,
            lineno,
            registry,
        } = self;
        let external = &**external;
        let internal = internal.as_deref();

        let (unit, separator) = match &options.separator {
            Separator::Newline => (
                decoder.read_until(newline, external, options.limit)?,
                Cow::Borrowed(&newline[..]),
            ),
            Separator::Custom(text) if !text.is_empty() => {
                let separator = to_external(text, external, internal, registry)?;
                (
                    decoder.read_until(&separator, external, options.limit)?,
                    separator,
                )
            }
            Separator::Custom(_) | Separator::Paragraph => {
                let separator = newline.repeat(2);
                decoder.skip_while(newline)?;
                let unit = decoder.read_until(&separator, external, options.limit)?;
                if matches!(&unit, Some(unit) if unit.ends_with(&separator)) {
                    decoder.skip_while(newline)?;
                }
                (unit, Cow::Owned(separator))
            }
            Separator::All => (
                decoder.read_until(&[], external, options.limit)?,
                Cow::Borrowed(&[][..]),
            ),
        };

        let Some(mut unit) = unit else {
            return Ok(None);
        };
        *lineno += 1;
        if options.chomp && !separator.is_empty() && unit.ends_with(&separator) {
            unit.truncate(unit.len() - separator.len());
        }
        tag(unit, external, internal).map(Some)
    }

    /// Reads the next line, failing with [`Error::EndOfFile`] at the end of the stream.
    pub fn readline(&mut self) -> Result<EncodedText> {
        self.readline_with(&LineOptions::default())
    }

    pub fn readline_with(&mut self, options: &LineOptions) -> Result<EncodedText> {
        self.gets_with(options)?.ok_or(Error::EndOfFile)
    }

    /// Reads all remaining lines. An exhausted stream gives an empty vector.
    pub fn readlines(&mut self) -> Result<Vec<EncodedText>> {
        self.each_line().collect()
    }

    /// Reads all remaining lines as specified by `options`, failing with [`Error::ZeroLimit`]
    /// for a limit of zero.
    pub fn readlines_with(&mut self, options: LineOptions) -> Result<Vec<EncodedText>> {
        self.lines_with(options).collect()
    }

    /// Returns an iterator over the remaining lines.
    ///
    /// The iterator reads lazily from this stream's cursor, so whatever it consumes is gone for
    /// any later read, and a line it has not reached yet is still there. It stops after the
    /// last line or after the first error.
    pub fn each_line(&mut self) -> Lines<'_, S> {
        self.lines_with(LineOptions::default())
    }

    /// Returns an iterator over the remaining lines as specified by `options`.
    ///
    /// A limit of zero would yield empty lines forever, so the iterator reports
    /// [`Error::ZeroLimit`] instead. [`gets_with`](Self::gets_with) accepts it and returns an
    /// empty line.
    pub fn lines_with(&mut self, options: LineOptions) -> Lines<'_, S> {
        Lines {
            stream: self,
            options,
            done: false,
        }
    }

    /// Returns an iterator over the remaining characters.
    pub fn each_char(&mut self) -> Chars<'_, S> {
        Chars {
            stream: self,
            done: false,
        }
    }

    /// Returns an iterator over the remaining raw bytes.
    pub fn each_byte(&mut self) -> Bytes<'_, S> {
        Bytes {
            stream: self,
            done: false,
        }
    }

    /// Reads everything left in the stream. An exhausted stream gives an empty text.
    pub fn read(&mut self) -> Result<EncodedText> {
        let unit = self.decoder.read_all()?;
        self.tag(unit)
    }

    /// Reads `n` bytes as binary text, fewer only if the stream ends first.
    ///
    /// Returns `None` at the end of the stream unless `n` is zero, in which case an empty text
    /// is returned.
    pub fn read_bytes(&mut self, n: usize) -> Result<Option<EncodedText>> {
        let bytes = self.decoder.read_n(n)?;
        Ok((n == 0 || !bytes.is_empty()).then(|| EncodedText::binary(bytes)))
    }

    /// Reads at most `n` bytes as binary text without waiting for more than one pull from the
    /// source.
    ///
    /// Buffered bytes are returned without touching the source at all. Returns `None` only at
    /// the end of the stream.
    pub fn readpartial(&mut self, n: usize) -> Result<Option<EncodedText>> {
        let bytes = self.decoder.read_partial(n)?;
        Ok((n == 0 || !bytes.is_empty()).then(|| EncodedText::binary(bytes)))
    }

    /// Reads at most `n` bytes as binary text straight from the source.
    ///
    /// This bypasses the buffer. Bytes buffered by an earlier read are not returned; they remain
    /// queued in front of the cursor, so mixing this with buffered reads on the same stream
    /// yields the stream out of order. A warning is logged when that happens.
    pub fn sysread(&mut self, n: usize) -> Result<Option<EncodedText>> {
        let bytes = self.decoder.sysread(n)?;
        Ok((n == 0 || !bytes.is_empty()).then(|| EncodedText::binary(bytes)))
    }

    /// Pushes a text back so that the next read starts with it.
    ///
    /// Text tagged with an encoding other than the external one (or binary) is converted into
    /// the external encoding first, resolving its encoding in the registry the stream was
    /// created with.
    pub fn ungetc(&mut self, text: &EncodedText) -> Result<()> {
        let bytes = to_external(
            text,
            &*self.external,
            self.internal.as_deref(),
            &self.registry,
        )?;
        self.decoder.unget(&bytes);
        Ok(())
    }

    pub fn ungetbyte(&mut self, byte: u8) {
        self.decoder.unget(&[byte]);
    }

    fn tag(&self, unit: Vec<u8>) -> Result<EncodedText> {
        tag(unit, &*self.external, self.internal.as_deref())
    }
}

impl EncodedStream<fs::File> {
    /// Opens a file in binary mode and wraps it in a stream configured by `mode`.
    ///
    /// The mode is parsed before the file is touched, so an invalid mode never opens it.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        let path = path.as_ref();
        let registry = Registry::builtin();
        let config = StreamConfig::parse(mode, registry)?;
        let file = fs::File::open(path)?;
        log::debug!("opened {} with {:?}", path.display(), config);
        Self::new(file, &config, registry)
    }
}

/// Opens a file, runs `f` on the stream and closes the file, whichever way `f` returns.
///
/// # Examples
///
/// ```rust,no_run
/// let line = encoded_io::open("foo.txt", "r:Shift_JIS:UTF-8", |f| f.gets())?;
/// # Ok::<(), encoded_io::Error>(())
/// ```
pub fn open<T>(
    path: impl AsRef<Path>,
    mode: &str,
    f: impl FnOnce(&mut EncodedStream<fs::File>) -> Result<T>,
) -> Result<T> {
    let mut stream = EncodedStream::open(path, mode)?;
    let ret = f(&mut stream);
    let closed = stream.close();
    let value = ret?;
    closed?;
    Ok(value)
}

/// Tags a unit read from the stream, converting it if an internal encoding is configured.
fn tag(
    unit: Vec<u8>,
    external: &dyn Transcoder,
    internal: Option<&dyn Transcoder>,
) -> Result<EncodedText> {
    match internal {
        None => Ok(EncodedText::new(unit, external.id())),
        Some(internal) => external.convert(&unit, internal),
    }
}

/// Returns the bytes of `text` in the external encoding.
fn to_external<'a>(
    text: &'a EncodedText,
    external: &dyn Transcoder,
    internal: Option<&dyn Transcoder>,
    registry: &Registry,
) -> Result<Cow<'a, [u8]>> {
    let id = text.encoding();
    if id == external.id() || id.is_binary() {
        return Ok(Cow::Borrowed(text.as_bytes()));
    }
    let looked_up;
    let from = match internal {
        Some(internal) if internal.id() == id => internal,
        _ => {
            looked_up = registry.lookup(id)?;
            &*looked_up
        }
    };
    if text.is_ascii() && from.is_ascii_compatible() && external.is_ascii_compatible() {
        return Ok(Cow::Borrowed(text.as_bytes()));
    }
    Ok(Cow::Owned(from.convert(text.as_bytes(), external)?.into_bytes()))
}

/// Turns the outcome of a read into the next item of a fused iterator.
fn next_item<T>(done: &mut bool, ret: Result<Option<T>>) -> Option<Result<T>> {
    if *done {
        return None;
    }
    match ret {
        Ok(Some(item)) => Some(Ok(item)),
        Ok(None) => {
            *done = true;
            None
        }
        Err(e) => {
            *done = true;
            Some(Err(e))
        }
    }
}

/// An iterator over the lines of an [`EncodedStream`], created by
/// [`each_line`](EncodedStream::each_line) or [`lines_with`](EncodedStream::lines_with).
#[derive(Debug)]
pub struct Lines<'a, S> {
    stream: &'a mut EncodedStream<S>,
    options: LineOptions,
    done: bool,
}

impl<S: ByteSource> Iterator for Lines<'_, S> {
    type Item = Result<EncodedText>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let ret = match self.options.limit {
            Some(0) => Err(Error::ZeroLimit),
            _ => self.stream.gets_with(&self.options),
        };
        next_item(&mut self.done, ret)
    }
}

impl<S: ByteSource> FusedIterator for Lines<'_, S> {}

/// An iterator over the characters of an [`EncodedStream`], created by
/// [`each_char`](EncodedStream::each_char).
#[derive(Debug)]
pub struct Chars<'a, S> {
    stream: &'a mut EncodedStream<S>,
    done: bool,
}

impl<S: ByteSource> Iterator for Chars<'_, S> {
    type Item = Result<EncodedText>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let ret = self.stream.get_char();
        next_item(&mut self.done, ret)
    }
}

impl<S: ByteSource> FusedIterator for Chars<'_, S> {}

/// An iterator over the raw bytes of an [`EncodedStream`], created by
/// [`each_byte`](EncodedStream::each_byte).
#[derive(Debug)]
pub struct Bytes<'a, S> {
    stream: &'a mut EncodedStream<S>,
    done: bool,
}

impl<S: ByteSource> Iterator for Bytes<'_, S> {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let ret = self.stream.get_byte();
        next_item(&mut self.done, ret)
    }
}

impl<S: ByteSource> FusedIterator for Bytes<'_, S> {}

/// Reads raw bytes through the stream's buffer.
impl<S: ByteSource> io::Read for EncodedStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let avail = self.decoder.fill_buf()?;
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        self.decoder.advance(n);
        Ok(n)
    }
}

impl<S: ByteSource> io::BufRead for EncodedStream<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.decoder.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.decoder.advance(amt);
    }
}
