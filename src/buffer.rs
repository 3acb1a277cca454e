use std::io;

use bstr::ByteSlice;

use super::{source::ByteSource, CharLenError, Transcoder};

// As of Rust 1.73.0: https://github.com/rust-lang/rust/blob/1.73.0/library/std/src/sys_common/io.rs#L3
pub(crate) const DEFAULT_BUF_SIZE: usize = if cfg!(target_os = "espidf") {
    512
} else {
    8 * 1024
};

pub(crate) const MIN_BUF_SIZE: usize = 16;

/// A growable read buffer over a [`ByteSource`] that hands out the smallest unit a read
/// operation asks for: one character, one byte, a line, `n` bytes or everything left.
///
/// Character and raw reads share the same buffer and cursor, so they can be interleaved freely
/// without losing or repeating bytes. Only [`sysread`](Self::sysread) bypasses the buffer.
///
/// Once the source reports exhaustion the decoder never pulls from it again; every subsequent
/// read reports the end of the stream after the buffered bytes are drained.
#[derive(Debug)]
pub(crate) struct BufferedDecoder<S> {
    source: S,
    /// Bytes pulled from the source; `buf[pos..]` is unconsumed.
    buf: Vec<u8>,
    pos: usize,
    /// How many bytes to request from the source per fill.
    chunk: usize,
    eof: bool,
    /// Number of bytes handed out so far, net of pushed-back bytes.
    offset: u64,
}

impl<S: ByteSource> BufferedDecoder<S> {
    pub fn with_capacity(capacity: usize, source: S) -> Self {
        let chunk = capacity.max(MIN_BUF_SIZE);
        Self {
            source,
            buf: Vec::with_capacity(chunk),
            pos: 0,
            chunk,
            eof: false,
            offset: 0,
        }
    }

    pub fn source_ref(&self) -> &S {
        &self.source
    }

    /// Returns the source along with any bytes buffered but not yet consumed.
    pub fn into_parts(mut self) -> (S, Vec<u8>) {
        self.buf.drain(..self.pos);
        (self.source, self.buf)
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.source.close()
    }

    /// Returns the unconsumed part of the buffer.
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Returns the number of bytes consumed from the stream so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Pulls one chunk from the source, returning the number of bytes added.
    fn fill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos >= self.chunk {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }

        let start = self.buf.len();
        self.buf.resize(start + self.chunk, 0);
        let ret = loop {
            match self.source.fill(&mut self.buf[start..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                ret => break ret,
            }
        };
        match ret {
            Ok(n) => {
                self.buf.truncate(start + n);
                if n == 0 {
                    self.eof = true;
                    log::trace!("source exhausted after {} bytes", self.offset);
                } else {
                    log::trace!("{} bytes has been read", n);
                }
                Ok(n)
            }
            Err(e) => {
                self.buf.truncate(start);
                Err(e)
            }
        }
    }

    /// Fills until at least `n` bytes are buffered or the source is exhausted, returning `true`
    /// in the former case.
    fn ensure(&mut self, n: usize) -> io::Result<bool> {
        while self.buffered().len() < n {
            if self.fill()? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn consume(&mut self, n: usize) -> Vec<u8> {
        debug_assert!(n <= self.buffered().len());
        let unit = self.buf[self.pos..self.pos + n].to_vec();
        self.advance(n);
        unit
    }

    /// Marks `n` buffered bytes as consumed.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.buffered().len());
        self.pos += n;
        self.offset += n as u64;
    }

    /// Returns the buffered bytes, filling first if none are buffered.
    pub fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.ensure(1)?;
        Ok(self.buffered())
    }

    /// Returns `true` if no byte is left in the buffer or the source.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        Ok(!self.ensure(1)?)
    }

    /// Returns the bytes of the next character as measured by `transcoder`.
    ///
    /// A byte that does not start a valid character, including a character cut short by the end
    /// of the stream, is returned alone so that reading always makes progress.
    pub fn next_char(&mut self, transcoder: &dyn Transcoder) -> io::Result<Option<Vec<u8>>> {
        if !self.ensure(1)? {
            return Ok(None);
        }
        loop {
            let avail = self.buffered();
            let len = match transcoder.char_boundary_len(avail) {
                Ok(n) => n,
                Err(CharLenError::NeedMoreBytes)
                    if avail.len() < transcoder.max_char_len() && !self.eof =>
                {
                    self.fill()?;
                    continue;
                }
                Err(e) => {
                    log::debug!(
                        "{:?} character in {} at offset {}; passing one byte through",
                        e,
                        transcoder.id(),
                        self.offset
                    );
                    1
                }
            };
            return Ok(Some(self.consume(len)));
        }
    }

    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if !self.ensure(1)? {
            return Ok(None);
        }
        let b = self.buf[self.pos];
        self.advance(1);
        Ok(Some(b))
    }

    /// Returns the bytes up to and including the first `terminator` that starts at a character
    /// boundary, or everything left if the stream ends first.
    ///
    /// With a `limit`, stops at the first character boundary at or past `limit` bytes. An empty
    /// `terminator` never matches.
    pub fn read_until(
        &mut self,
        terminator: &[u8],
        transcoder: &dyn Transcoder,
        limit: Option<usize>,
    ) -> io::Result<Option<Vec<u8>>> {
        if !self.ensure(1)? {
            return Ok(None);
        }
        let len = match limit {
            None if terminator.is_empty() => {
                while self.fill()? > 0 {}
                self.buffered().len()
            }
            None if transcoder.is_byte_searchable(terminator) => self.scan_bytes(terminator)?,
            _ => self.scan_chars(terminator, transcoder, limit)?,
        };
        Ok(Some(self.consume(len)))
    }

    /// Locates `terminator` by a plain byte search.
    fn scan_bytes(&mut self, terminator: &[u8]) -> io::Result<usize> {
        let mut from = 0;
        loop {
            let avail = self.buffered();
            if let Some(i) = avail[from..].find(terminator) {
                return Ok(from + i + terminator.len());
            }
            // keep a tail that may be the beginning of a terminator split across fills
            from = (avail.len() + 1).saturating_sub(terminator.len());
            if self.fill()? == 0 {
                return Ok(self.buffered().len());
            }
        }
    }

    /// Locates `terminator` by stepping through whole characters, checking for a match at every
    /// character boundary.
    fn scan_chars(
        &mut self,
        terminator: &[u8],
        transcoder: &dyn Transcoder,
        limit: Option<usize>,
    ) -> io::Result<usize> {
        let mut off = 0;
        loop {
            if limit.map_or(false, |limit| off >= limit) {
                return Ok(off);
            }
            let rest = &self.buffered()[off..];
            if rest.len() < terminator.len().max(1) && !self.eof {
                self.fill()?;
                continue;
            }
            if rest.is_empty() {
                return Ok(off);
            }
            // a terminator running past the limit is cut at the limit like any other character
            if !terminator.is_empty()
                && rest.starts_with(terminator)
                && limit.map_or(true, |limit| off + terminator.len() <= limit)
            {
                return Ok(off + terminator.len());
            }
            match transcoder.char_boundary_len(rest) {
                Ok(n) => off += n,
                Err(CharLenError::NeedMoreBytes) if !self.eof => {
                    self.fill()?;
                }
                Err(_) => off += 1,
            }
        }
    }

    /// Consumes leading repetitions of `unit`, returning how many were skipped.
    pub fn skip_while(&mut self, unit: &[u8]) -> io::Result<usize> {
        let mut skipped = 0;
        while self.ensure(unit.len())? && self.buffered().starts_with(unit) {
            self.advance(unit.len());
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Drains the source and returns everything not consumed yet.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        while self.fill()? > 0 {}
        Ok(self.consume(self.buffered().len()))
    }

    /// Returns up to `n` bytes, fewer only if the stream ends first.
    pub fn read_n(&mut self, n: usize) -> io::Result<Vec<u8>> {
        self.ensure(n)?;
        Ok(self.consume(n.min(self.buffered().len())))
    }

    /// Returns up to `n` bytes that are available with at most one fill; empty only at the end
    /// of the stream (or if `n` is zero).
    pub fn read_partial(&mut self, n: usize) -> io::Result<Vec<u8>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if self.buffered().is_empty() {
            self.fill()?;
        }
        Ok(self.consume(n.min(self.buffered().len())))
    }

    /// Reads up to `n` bytes straight from the source, bypassing the buffer.
    ///
    /// Bytes already buffered are neither returned nor discarded; they stay in front of the
    /// cursor for the next buffered read, so mixing this with buffered reads reorders the
    /// stream.
    pub fn sysread(&mut self, n: usize) -> io::Result<Vec<u8>> {
        if !self.buffered().is_empty() {
            log::warn!(
                "sysread bypasses {} buffered bytes at offset {}",
                self.buffered().len(),
                self.offset
            );
        }
        if self.eof || n == 0 {
            return Ok(Vec::new());
        }
        let mut out = vec![0; n];
        let read = loop {
            match self.source.fill(&mut out) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                ret => break ret?,
            }
        };
        if read == 0 {
            self.eof = true;
        }
        out.truncate(read);
        self.offset += read as u64;
        Ok(out)
    }

    /// Pushes `bytes` back in front of the cursor.
    pub fn unget(&mut self, bytes: &[u8]) {
        if bytes.len() <= self.pos {
            self.pos -= bytes.len();
            self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        } else {
            let mut buf = Vec::with_capacity(bytes.len() + self.buffered().len() + self.chunk);
            buf.extend_from_slice(bytes);
            buf.extend_from_slice(self.buffered());
            self.buf = buf;
            self.pos = 0;
        }
        self.offset = self.offset.saturating_sub(bytes.len() as u64);
    }
}
