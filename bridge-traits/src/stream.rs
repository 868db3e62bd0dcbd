//! Live Stream Source Abstraction

use crate::error::Result;

/// Blocking producer of a live byte stream.
///
/// A live source never ends: `Ok(0)` from [`read_data`](Self::read_data)
/// means "nothing right now", not end-of-stream. Reads may return fewer bytes
/// than requested.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::stream::UpstreamSource;
///
/// fn pump(source: &mut dyn UpstreamSource, buf: &mut [u8]) -> Result<usize> {
///     source.start()?;
///     source.read_data(buf)
/// }
/// ```
pub trait UpstreamSource: Send {
    /// Connect to the stream. Called once, from the thread that will read.
    fn start(&mut self) -> Result<()>;

    /// Read up to `buf.len()` bytes, blocking until some arrive or the
    /// source gives up for now.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<T: UpstreamSource + ?Sized> UpstreamSource for Box<T> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_data(buf)
    }
}

/// Finite, random-access byte source such as a finished recording.
///
/// Unlike [`UpstreamSource`], the length is known once opened and
/// `Ok(0)` from [`read_at`](Self::read_at) means end of data.
pub trait RecordedSource: Send {
    /// Open the source, returning its total length in bytes.
    fn open(&mut self) -> Result<u64>;

    /// Read up to `buf.len()` bytes starting at absolute position `pos`.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize>;
}

impl<T: RecordedSource + ?Sized> RecordedSource for Box<T> {
    fn open(&mut self) -> Result<u64> {
        (**self).open()
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(pos, buf)
    }
}
