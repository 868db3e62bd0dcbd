//! # Timeshift Buffer
//!
//! Decorates a live [`StreamReader`] with pause, rewind and fast-forward.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │  inner StreamReader      │  live source
//! └────────────┬─────────────┘
//!              │ IngestWorker (background thread)
//!      ┌───────┴────────┐
//!      ▼                ▼
//! ┌──────────┐   ┌──────────────┐
//! │ RingCache│   │ BackingStore │  every byte, unbounded
//! └────┬─────┘   └──────┬───────┘
//!      │  hit           │  evicted
//!      └──────┬─────────┘
//!             ▼
//!      TimeshiftBuffer::read (player thread)
//! ```
//!
//! Reads try the ring cache first. A position the cache has already evicted
//! is served from the backing store; a position the producer has not reached
//! yet waits up to `read_timeout` for it. Store reads never go past the
//! store's gap-free prefix, so a failed append surfaces as
//! [`PlaybackError::StoreGap`] instead of bytes from the wrong position.
//!
//! ## Lifecycle
//!
//! `Created → Started → Stopped`. Stopping cancels and joins the worker,
//! truncates the backing store and releases the cache arena. Dropping a
//! buffer that was not stopped stops it.

use crate::config::{TimeshiftConfig, TimeshiftState, TimeshiftStats};
use crate::error::{CacheError, PlaybackError, Result};
use crate::ingest::{IngestTargets, IngestWorker, StoreExtent};
use crate::ring_cache::RingCache;
use crate::traits::{resolve_seek, ReaderSource, StreamReader};
use bridge_traits::{BackingStore, BackingStoreProvider, Clock};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Read cursors for the single consumer.
#[derive(Debug, Default)]
struct Cursor {
    /// Next absolute position handed to the player.
    read_pos: u64,
    /// Where the backing store's read cursor was last left.
    store_pos: u64,
}

/// Timeshifting decorator over a live stream reader.
pub struct TimeshiftBuffer {
    session_id: Uuid,
    inner: Arc<dyn StreamReader>,
    config: TimeshiftConfig,
    cache: Arc<RingCache>,
    store: Arc<dyn BackingStore>,
    extent: Arc<Mutex<StoreExtent>>,
    clock: Arc<dyn Clock>,
    cursor: Mutex<Cursor>,
    started_at: Mutex<DateTime<Utc>>,
    state: Mutex<TimeshiftState>,
    stats: Arc<Mutex<TimeshiftStats>>,
    worker: Mutex<Option<IngestWorker>>,
}

impl TimeshiftBuffer {
    /// Create a buffer whose backing store comes from `provider`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Config`] if `config` is invalid
    /// - [`PlaybackError::CapabilityMissing`] if the provider's buffer
    ///   location is unavailable
    /// - [`PlaybackError::Bridge`] if the store cannot be opened
    pub fn new(
        inner: Box<dyn StreamReader>,
        provider: &dyn BackingStoreProvider,
        config: TimeshiftConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = open_store(provider, &config)?;
        Self::with_store(inner, store, config, clock)
    }

    /// Create a buffer over an already opened backing store.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Config`] if `config` is invalid
    pub fn with_store(
        inner: Box<dyn StreamReader>,
        store: Box<dyn BackingStore>,
        config: TimeshiftConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::Config)?;

        let now = clock.now();
        Ok(Self {
            session_id: Uuid::new_v4(),
            inner: Arc::from(inner),
            cache: Arc::new(RingCache::with_config(&config)),
            store: Arc::from(store),
            extent: Arc::new(Mutex::new(StoreExtent::default())),
            config,
            clock,
            cursor: Mutex::new(Cursor::default()),
            started_at: Mutex::new(now),
            state: Mutex::new(TimeshiftState::Created),
            stats: Arc::new(Mutex::new(TimeshiftStats::default())),
            worker: Mutex::new(None),
        })
    }

    /// Identifier used in this session's log lines.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> TimeshiftState {
        *self.state.lock()
    }

    /// Get a snapshot of the session counters.
    pub fn stats(&self) -> TimeshiftStats {
        self.stats.lock().clone()
    }

    /// Configuration this buffer was built with.
    pub fn config(&self) -> &TimeshiftConfig {
        &self.config
    }

    /// Stop ingesting and reclaim the backing store. Idempotent.
    ///
    /// The worker is joined before the store is truncated, so no append can
    /// land after the truncation.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state == TimeshiftState::Stopped {
            return Ok(());
        }

        if let Some(mut worker) = self.worker.lock().take() {
            worker.stop();
        }

        let truncated = self.store.truncate();
        self.cache.close();
        *state = TimeshiftState::Stopped;

        let stats = self.stats.lock().clone();
        debug!(
            bytes_ingested = stats.bytes_ingested,
            store_fallback_ratio = stats.store_fallback_ratio(),
            read_timeouts = stats.read_timeouts,
            "Timeshift: Stopped"
        );

        truncated.map_err(PlaybackError::from)
    }

    fn read_from_cache(&self, pos: u64, buf: &mut [u8]) -> std::result::Result<usize, CacheError> {
        let read = self.cache.read(pos, buf)?;
        self.stats.lock().cache_reads += 1;
        Ok(read)
    }

    /// Serve `buf` from the backing store, reseeking it only when its cursor
    /// is not already at the read position.
    fn read_from_store(&self, cursor: &mut Cursor, buf: &mut [u8]) -> Result<usize> {
        let pos = cursor.read_pos;
        let stored = self.extent.lock().end;
        if pos >= stored {
            warn!(position = pos, stored, "Timeshift: Evicted data missing from backing store");
            return Err(PlaybackError::StoreGap {
                position: pos,
                stored,
            });
        }
        let len = buf.len().min(usize::try_from(stored - pos).unwrap_or(usize::MAX));
        let buf = &mut buf[..len];

        if cursor.store_pos != pos {
            let landed = self.store.seek(pos)?;
            if landed != pos {
                return Err(PlaybackError::Internal(format!(
                    "Backing store seek to {} landed at {}",
                    pos, landed
                )));
            }
            cursor.store_pos = pos;
        }

        let read = self.store.read(buf)?;
        cursor.store_pos += read as u64;
        self.stats.lock().store_reads += 1;
        Ok(read)
    }
}

fn open_store(
    provider: &dyn BackingStoreProvider,
    config: &TimeshiftConfig,
) -> Result<Box<dyn BackingStore>> {
    config.validate().map_err(PlaybackError::Config)?;

    if !provider.is_available() {
        return Err(PlaybackError::CapabilityMissing(
            "Timeshift buffer location is not available".to_string(),
        ));
    }

    Ok(provider.open_store(&config.buffer_file_name)?)
}

impl StreamReader for TimeshiftBuffer {
    /// Open the cache and launch the ingest worker. Idempotent while running.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            TimeshiftState::Started => return Ok(()),
            TimeshiftState::Stopped => {
                return Err(PlaybackError::Internal(
                    "Timeshift buffer cannot restart after stop".to_string(),
                ))
            }
            TimeshiftState::Created => {}
        }

        info!(
            capacity = self.config.cache_capacity,
            chunk_size = self.config.chunk_size,
            "Timeshift: Started"
        );
        self.cache.open()?;
        *self.started_at.lock() = self.clock.now();

        let targets = IngestTargets {
            cache: self.cache.clone(),
            store: self.store.clone(),
            extent: self.extent.clone(),
            stats: self.stats.clone(),
        };
        let source = Box::new(ReaderSource::new(self.inner.clone()));
        let worker = match IngestWorker::spawn(source, targets, self.config.chunk_size) {
            Ok(worker) => worker,
            Err(e) => {
                self.cache.close();
                return Err(e);
            }
        };

        *self.worker.lock() = Some(worker);
        *state = TimeshiftState::Started;
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if !self.state().is_active() {
            return Err(PlaybackError::NotStarted);
        }

        // A request larger than the cache could never be satisfied from it
        let len = buf.len().min(self.cache.capacity());
        let buf = &mut buf[..len];
        if buf.is_empty() {
            return Ok(0);
        }

        let mut cursor = self.cursor.lock();
        let pos = cursor.read_pos;

        let read = match self.read_from_cache(pos, buf) {
            Ok(read) => read,
            Err(CacheError::Evicted { .. }) => self.read_from_store(&mut cursor, buf)?,
            Err(e) if e.is_transient() => {
                let waited = self.config.read_timeout;
                let avail = self.cache.wait_for_data(pos, len, waited);
                if avail < len as u64 {
                    debug!(position = pos, avail, "Timeshift: Cache timeout; waited {:?}", waited);
                    self.stats.lock().read_timeouts += 1;
                    return Err(PlaybackError::Timeout {
                        position: pos,
                        waited,
                    });
                }

                match self.read_from_cache(pos, buf) {
                    Ok(read) => read,
                    // the producer lapped the reader during the wait
                    Err(CacheError::Evicted { .. }) => self.read_from_store(&mut cursor, buf)?,
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        cursor.read_pos += read as u64;
        Ok(read)
    }

    fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let end = self.length();
        let mut cursor = self.cursor.lock();

        let target = resolve_seek(pos, cursor.read_pos, end).map_err(|e| {
            error!(length = end, "Timeshift: Invalid seek; {}", e);
            e
        })?;

        cursor.read_pos = target;
        Ok(target)
    }

    /// Read cursor of the backing store, which lags the player's cursor
    /// while reads are served from the cache.
    fn position(&self) -> u64 {
        match self.store.position() {
            Ok(pos) => pos,
            Err(e) => {
                warn!(error = %e, "Backing store position unavailable");
                self.cursor.lock().store_pos
            }
        }
    }

    fn length(&self) -> u64 {
        self.cache.cached_data_end_pos()
    }

    fn time_start(&self) -> DateTime<Utc> {
        *self.started_at.lock()
    }

    fn time_end(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // live edge detection is not implemented; players treat the stream as live
    fn near_end(&self) -> bool {
        true
    }

    fn can_timeshift(&self) -> bool {
        true
    }
}

impl Drop for TimeshiftBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(session_id = %self.session_id, error = %e, "Timeshift teardown failed");
        }
    }
}
