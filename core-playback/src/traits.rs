//! # Stream Reader Capability
//!
//! Every way of serving a live channel to the player implements
//! [`StreamReader`]. Variants compose by wrapping: a
//! [`TimeshiftBuffer`](crate::timeshift::TimeshiftBuffer) holds the
//! [`LiveStreamReader`](crate::live::LiveStreamReader) it buffers and drains it
//! from a background worker.
//!
//! ## Threading Model
//!
//! Readers are shared between the player thread and an ingest worker, so all
//! methods take `&self` and implementations are `Send + Sync`, keeping their
//! mutable state behind locks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_playback::StreamReader;
//! use std::io::SeekFrom;
//!
//! fn rewind_ten_seconds(reader: &dyn StreamReader, bytes_per_sec: i64) {
//!     if reader.can_timeshift() {
//!         let _ = reader.seek(SeekFrom::Current(-10 * bytes_per_sec));
//!     }
//! }
//! ```

use crate::error::{PlaybackError, Result};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::UpstreamSource;
use chrono::{DateTime, Utc};
use std::io::SeekFrom;
use std::sync::Arc;

/// Capability surface of a live stream reader.
pub trait StreamReader: Send + Sync {
    /// Begin producing data.
    fn start(&self) -> Result<()>;

    /// Read up to `buf.len()` bytes at the reader's cursor, advancing it.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor, returning the new absolute position.
    fn seek(&self, pos: SeekFrom) -> Result<u64>;

    /// Absolute position of the cursor.
    fn position(&self) -> u64;

    /// Bytes available to the reader so far.
    fn length(&self) -> u64;

    /// Earliest moment the reader can serve.
    fn time_start(&self) -> DateTime<Utc>;

    /// Latest moment the reader can serve.
    fn time_end(&self) -> DateTime<Utc>;

    /// Whether the cursor sits at the live edge.
    fn near_end(&self) -> bool;

    /// Whether the reader supports pause and rewind.
    fn can_timeshift(&self) -> bool;
}

impl<T: StreamReader + ?Sized> StreamReader for Box<T> {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn seek(&self, pos: SeekFrom) -> Result<u64> {
        (**self).seek(pos)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn length(&self) -> u64 {
        (**self).length()
    }

    fn time_start(&self) -> DateTime<Utc> {
        (**self).time_start()
    }

    fn time_end(&self) -> DateTime<Utc> {
        (**self).time_end()
    }

    fn near_end(&self) -> bool {
        (**self).near_end()
    }

    fn can_timeshift(&self) -> bool {
        (**self).can_timeshift()
    }
}

/// Resolve a [`SeekFrom`] against the reader's cursor and data length.
///
/// Targets must land in `[0, end]`; anything else, including arithmetic
/// overflow, is [`PlaybackError::SeekOutOfBounds`].
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, end: u64) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => i64::try_from(offset).ok(),
        SeekFrom::Current(delta) => i64::try_from(current)
            .ok()
            .and_then(|base| base.checked_add(delta)),
        SeekFrom::End(delta) => i64::try_from(end)
            .ok()
            .and_then(|base| base.checked_add(delta)),
    }
    .unwrap_or(i64::MAX);

    if target < 0 || target as u64 > end {
        return Err(PlaybackError::SeekOutOfBounds {
            target,
            length: end,
        });
    }
    Ok(target as u64)
}

/// Presents a shared [`StreamReader`] as an [`UpstreamSource`] so the ingest
/// worker can drain any reader.
pub struct ReaderSource {
    reader: Arc<dyn StreamReader>,
}

impl ReaderSource {
    pub fn new(reader: Arc<dyn StreamReader>) -> Self {
        Self { reader }
    }
}

impl UpstreamSource for ReaderSource {
    fn start(&mut self) -> BridgeResult<()> {
        self.reader.start().map_err(into_bridge)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> BridgeResult<usize> {
        self.reader.read(buf).map_err(into_bridge)
    }
}

fn into_bridge(error: PlaybackError) -> BridgeError {
    match error {
        PlaybackError::Bridge(inner) => inner,
        other => BridgeError::OperationFailed(other.to_string()),
    }
}
