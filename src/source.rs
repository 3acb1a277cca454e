use std::io;

/// A pull-based provider of raw bytes.
///
/// This is the only contact point between the stream layer and the underlying resource. A byte
/// source has no notion of encodings or lines; it hands out bytes exactly as stored, which for a
/// file means it must be opened in binary mode without newline translation.
///
/// Every [`std::io::Read`] implementation is a byte source, so files, sockets, byte slices and
/// cursors can be wrapped directly.
pub trait ByteSource {
    /// Pulls bytes into `buf`, returning how many were written. `Ok(0)` signals exhaustion when
    /// `buf` is not empty.
    ///
    /// Transport errors are returned as they are; the stream layer does not retry them.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Releases the underlying resource.
    ///
    /// The default implementation does nothing and leaves the release to `Drop`.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: io::Read> ByteSource for R {
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}
