//! Finished recordings: a finite, seekable stream with a known length.
//!
//! Unlike live channels there is nothing to buffer; every read goes straight
//! to the [`RecordedSource`] at the reader's cursor.

use crate::error::{PlaybackError, Result};
use crate::traits::{resolve_seek, StreamReader};
use bridge_traits::{Clock, RecordedSource};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads a recording through its [`RecordedSource`].
pub struct RecordingReader {
    source: Mutex<Box<dyn RecordedSource>>,
    clock: Arc<dyn Clock>,
    /// Total bytes; `None` until started.
    length: Mutex<Option<u64>>,
    cursor: Mutex<u64>,
    started_at: Mutex<DateTime<Utc>>,
}

impl RecordingReader {
    pub fn new(source: Box<dyn RecordedSource>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            source: Mutex::new(source),
            clock,
            length: Mutex::new(None),
            cursor: Mutex::new(0),
            started_at: Mutex::new(now),
        }
    }

    fn opened_length(&self) -> Result<u64> {
        (*self.length.lock()).ok_or(PlaybackError::NotStarted)
    }
}

impl StreamReader for RecordingReader {
    /// Open the source and learn its length. Restarting rewinds to 0.
    fn start(&self) -> Result<()> {
        let length = self.source.lock().open()?;
        *self.length.lock() = Some(length);
        *self.cursor.lock() = 0;
        *self.started_at.lock() = self.clock.now();
        debug!(length, "Recording started");
        Ok(())
    }

    /// Read at the cursor; `Ok(0)` at the end of the recording.
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let length = self.opened_length()?;
        let mut cursor = self.cursor.lock();

        let remaining = length.saturating_sub(*cursor);
        let len = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if len == 0 {
            return Ok(0);
        }

        let read = self.source.lock().read_at(*cursor, &mut buf[..len])?;
        if read == 0 {
            warn!(position = *cursor, length, "Recording ended before its length");
        }
        *cursor += read as u64;
        Ok(read)
    }

    fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let length = self.opened_length()?;
        let mut cursor = self.cursor.lock();
        *cursor = resolve_seek(pos, *cursor, length)?;
        Ok(*cursor)
    }

    fn position(&self) -> u64 {
        *self.cursor.lock()
    }

    fn length(&self) -> u64 {
        self.length.lock().unwrap_or(0)
    }

    fn time_start(&self) -> DateTime<Utc> {
        *self.started_at.lock()
    }

    fn time_end(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// True only once the cursor has reached the end of the recording.
    fn near_end(&self) -> bool {
        match *self.length.lock() {
            Some(length) => *self.cursor.lock() >= length,
            None => false,
        }
    }

    fn can_timeshift(&self) -> bool {
        false
    }
}
