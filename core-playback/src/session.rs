//! # Live Session
//!
//! Owns the reader for the channel currently playing and decides when it
//! gets a timeshift buffer.
//!
//! | Mode         | On open            | On pause                       |
//! |--------------|--------------------|--------------------------------|
//! | `Off`        | direct reader      | nothing                        |
//! | `OnPlayback` | timeshift buffer   | nothing (already buffering)    |
//! | `OnPause`    | direct reader      | promote to a timeshift buffer  |
//!
//! Every query has a neutral answer while no stream is open, so the host can
//! call it at any point in its lifecycle.
//!
//! A finished recording is played through a separate slot (`*_recorded`), so
//! opening one leaves the live stream untouched.

use crate::config::TimeshiftConfig;
use crate::error::{PlaybackError, Result};
use crate::live::LiveStreamReader;
use crate::recording::RecordingReader;
use crate::timeshift::TimeshiftBuffer;
use crate::traits::StreamReader;
use bridge_traits::{BackingStore, RecordedSource, UpstreamSource};
use chrono::{DateTime, Utc};
use core_runtime::{CoreConfig, TimeshiftMode};
use std::io::SeekFrom;
use tracing::{debug, info, warn};

/// Live playback session for one channel at a time.
pub struct LiveSession {
    core: CoreConfig,
    timeshift: TimeshiftConfig,
    reader: Option<Box<dyn StreamReader>>,
    recording: Option<RecordingReader>,
}

impl LiveSession {
    pub fn new(core: CoreConfig, timeshift: TimeshiftConfig) -> Self {
        Self {
            core,
            timeshift,
            reader: None,
            recording: None,
        }
    }

    /// Open `upstream`, closing whatever was playing.
    ///
    /// Returns whether the reader started. A reader that failed to start
    /// stays open so the host can close it as usual.
    ///
    /// # Errors
    ///
    /// Fails only when a timeshift buffer was wanted and could not be
    /// created.
    pub fn open(&mut self, upstream: Box<dyn UpstreamSource>) -> Result<bool> {
        self.close();

        let live: Box<dyn StreamReader> =
            Box::new(LiveStreamReader::new(upstream, self.core.clock.clone()));

        let reader = if self.core.timeshift_mode == TimeshiftMode::OnPlayback
            && self.core.buffer_available()
        {
            let store = self.open_store()?;
            self.wrap(live, store)?
        } else {
            live
        };

        let started = start_reader(reader.as_ref());
        self.reader = Some(reader);
        Ok(started)
    }

    /// Drop the current reader, tearing down any timeshift buffer.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Live stream closed");
        }
    }

    /// Returns `true` while a stream is open.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// React to the player pausing or resuming.
    ///
    /// Pausing a direct reader while timeshifting is enabled swaps it for a
    /// timeshift buffer that starts recording from this moment.
    pub fn pause(&mut self, paused: bool) -> Result<()> {
        if !paused || !self.core.timeshift_mode.is_enabled() || !self.core.buffer_available() {
            return Ok(());
        }

        let promotable = self
            .reader
            .as_ref()
            .map(|reader| !reader.can_timeshift())
            .unwrap_or(false);
        if !promotable {
            return Ok(());
        }

        // open the store before giving up the direct reader
        let store = self.open_store()?;
        if let Some(live) = self.reader.take() {
            info!("Promoting live stream to timeshift on pause");
            // cannot fail: open_store validated the config
            let reader = self.wrap(live, store)?;
            start_reader(reader.as_ref());
            self.reader = Some(reader);
        }
        Ok(())
    }

    /// Read from the current stream; 0 when none is open.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let Some(reader) = &self.reader else {
            return Ok(0);
        };

        reader.read(buf).map_err(|e| {
            if e.is_transient() {
                debug!(error = %e, "Live stream read will be retried");
            } else {
                warn!(error = %e, "Live stream read failed");
            }
            e
        })
    }

    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        match &self.reader {
            Some(reader) => reader.seek(pos),
            None => Err(PlaybackError::NoStream),
        }
    }

    pub fn position(&self) -> Option<u64> {
        self.reader.as_ref().map(|reader| reader.position())
    }

    pub fn length(&self) -> Option<u64> {
        self.reader.as_ref().map(|reader| reader.length())
    }

    /// Whether the player is at the live edge.
    pub fn is_real_time(&self) -> bool {
        self.reader
            .as_ref()
            .map(|reader| reader.near_end())
            .unwrap_or(false)
    }

    pub fn can_pause(&self) -> bool {
        if !self.core.timeshift_mode.is_enabled() {
            return false;
        }
        self.reader
            .as_ref()
            .map(|reader| reader.can_timeshift() || self.core.buffer_available())
            .unwrap_or(false)
    }

    /// Players check seeking before offering pause, so this follows the
    /// mode rather than the current reader.
    pub fn can_seek(&self) -> bool {
        self.core.timeshift_mode.is_enabled()
    }

    pub fn is_timeshifting(&self) -> bool {
        self.reader
            .as_ref()
            .map(|reader| reader.can_timeshift())
            .unwrap_or(false)
    }

    pub fn buffer_time_start(&self) -> Option<DateTime<Utc>> {
        self.reader.as_ref().map(|reader| reader.time_start())
    }

    pub fn buffer_time_end(&self) -> Option<DateTime<Utc>> {
        self.reader.as_ref().map(|reader| reader.time_end())
    }

    pub fn playing_time(&self) -> Option<DateTime<Utc>> {
        self.buffer_time_end()
    }

    /// Open a finished recording, closing any previous one.
    ///
    /// Returns whether it started; a recording that failed to start stays
    /// open and reads as not started until closed.
    pub fn open_recorded(&mut self, source: Box<dyn RecordedSource>) -> bool {
        self.close_recorded();

        let recording = RecordingReader::new(source, self.core.clock.clone());
        let started = match recording.start() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Recording failed to start");
                false
            }
        };
        self.recording = Some(recording);
        started
    }

    pub fn close_recorded(&mut self) {
        if self.recording.take().is_some() {
            debug!("Recording closed");
        }
    }

    /// Read from the open recording; 0 when none is open.
    pub fn read_recorded(&self, buf: &mut [u8]) -> Result<usize> {
        match &self.recording {
            Some(recording) => recording.read(buf),
            None => Ok(0),
        }
    }

    /// Seek the open recording; 0 when none is open.
    pub fn seek_recorded(&self, pos: SeekFrom) -> Result<u64> {
        match &self.recording {
            Some(recording) => recording.seek(pos),
            None => Ok(0),
        }
    }

    pub fn position_recorded(&self) -> Option<u64> {
        self.recording.as_ref().map(|recording| recording.position())
    }

    pub fn length_recorded(&self) -> Option<u64> {
        self.recording.as_ref().map(|recording| recording.length())
    }

    fn open_store(&self) -> Result<Box<dyn BackingStore>> {
        self.timeshift.validate().map_err(PlaybackError::Config)?;

        let provider = self.core.store_provider.as_ref().ok_or_else(|| {
            PlaybackError::CapabilityMissing("No backing store provider configured".to_string())
        })?;
        Ok(provider.open_store(&self.timeshift.buffer_file_name)?)
    }

    fn wrap(
        &self,
        live: Box<dyn StreamReader>,
        store: Box<dyn BackingStore>,
    ) -> Result<Box<dyn StreamReader>> {
        let buffer = TimeshiftBuffer::with_store(
            live,
            store,
            self.timeshift.clone(),
            self.core.clock.clone(),
        )?;
        Ok(Box::new(buffer))
    }
}

fn start_reader(reader: &dyn StreamReader) -> bool {
    match reader.start() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Live stream failed to start");
            false
        }
    }
}
