//! # Ring Cache for Live Stream Bytes
//!
//! A fixed-capacity circular byte buffer addressed by absolute stream
//! position. Position `p` lives in arena slot `p % capacity`; the cache keeps
//! the most recent `capacity` bytes and silently drops older ones.
//!
//! ## Design
//!
//! - **Addressing**: callers always speak absolute positions; `begin..end` is
//!   the retained window and `end - begin <= capacity` holds at all times
//! - **Locking**: one `parking_lot::Mutex` guards the window and the arena
//! - **Waiting**: a `Condvar` is broadcast on every successful write; waiters
//!   also wake every poll quantum and re-check, so a missed signal costs at
//!   most one quantum
//! - **No backpressure**: writes never block; a full cache evicts its oldest
//!   bytes
//!
//! ## Short writes and reads
//!
//! Neither [`RingCache::write`] nor [`RingCache::read`] crosses the physical
//! wrap point in one call. A call that would is truncated at the boundary and
//! the caller continues with the remainder.
//!
//! ## Usage
//!
//! ```rust
//! use core_playback::ring_cache::RingCache;
//!
//! let cache = RingCache::new(16);
//! cache.open().unwrap();
//!
//! assert_eq!(cache.write(b"0123456789").unwrap(), 10);
//! // Only 6 bytes fit before the wrap boundary
//! assert_eq!(cache.write(b"abcdefghij").unwrap(), 6);
//!
//! let mut buf = [0u8; 10];
//! assert_eq!(cache.read(0, &mut buf).unwrap(), 10);
//! assert_eq!(&buf, b"0123456789");
//! ```

use crate::arena::ByteArena;
use crate::config::TimeshiftConfig;
use crate::error::CacheError;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default forward distance a seek will wait for.
pub const DEFAULT_SEEK_SLACK: u64 = 100_000;

/// Default bound on a seek's wait inside the slack window.
pub const DEFAULT_SEEK_WAIT: Duration = Duration::from_secs(5);

/// Default poll quantum for waiters.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct CacheState {
    /// Absolute position of the oldest retained byte.
    begin: u64,
    /// Absolute position one past the newest byte.
    end: u64,
    arena: Option<ByteArena>,
}

/// Thread-safe circular byte cache in absolute stream coordinates.
pub struct RingCache {
    capacity: usize,
    seek_slack: u64,
    seek_wait: Duration,
    poll_interval: Duration,
    state: Mutex<CacheState>,
    written: Condvar,
}

impl RingCache {
    /// Create a cache of `capacity` bytes. No memory is allocated until
    /// [`open`](Self::open).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seek_slack: DEFAULT_SEEK_SLACK,
            seek_wait: DEFAULT_SEEK_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: Mutex::new(CacheState {
                begin: 0,
                end: 0,
                arena: None,
            }),
            written: Condvar::new(),
        }
    }

    /// Create a cache sized and tuned from a timeshift configuration.
    pub fn with_config(config: &TimeshiftConfig) -> Self {
        Self::new(config.cache_capacity)
            .with_seek_slack(config.seek_slack_bytes, config.seek_wait)
            .with_poll_interval(config.wait_poll_interval)
    }

    /// Set the forward slack window and the bound on a seek's wait in it.
    pub fn with_seek_slack(mut self, slack: u64, wait: Duration) -> Self {
        self.seek_slack = slack;
        self.seek_wait = wait;
        self
    }

    /// Set the poll quantum used while waiting for data.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Allocate the arena and reset the window to `0..0`.
    ///
    /// Reopening an open cache discards its contents.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Allocation`] if the arena cannot be obtained.
    pub fn open(&self) -> Result<(), CacheError> {
        let arena = ByteArena::acquire(self.capacity)?;

        let mut state = self.state.lock();
        state.arena = Some(arena);
        state.begin = 0;
        state.end = 0;
        debug!(capacity = self.capacity, "Ring cache opened");
        Ok(())
    }

    /// Release the arena. Safe to call repeatedly or without a prior `open`.
    pub fn close(&self) {
        let released = self.state.lock().arena.take();
        if released.is_some() {
            debug!(capacity = self.capacity, "Ring cache closed");
        }
    }

    /// Returns `true` between a successful `open` and the next `close`.
    pub fn is_open(&self) -> bool {
        self.state.lock().arena.is_some()
    }

    /// Append `data` at the end of the cache.
    ///
    /// Writes at most up to the physical wrap boundary and returns how many
    /// bytes were taken; the caller writes the remainder with another call.
    /// Bytes older than `end - capacity` are evicted. Every non-empty write
    /// wakes all waiters.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotOpen`] if the arena is not allocated.
    pub fn write(&self, data: &[u8]) -> Result<usize, CacheError> {
        let mut state = self.state.lock();
        let CacheState { begin, end, arena } = &mut *state;
        let arena = arena.as_mut().ok_or(CacheError::NotOpen)?;

        let slot = self.slot(*end);
        let len = data.len().min(arena.len() - slot);
        if len == 0 {
            return Ok(0);
        }

        arena.copy_in(slot, &data[..len]);
        *end += len as u64;

        // drop history that was overwritten
        let capacity = self.capacity as u64;
        if *end - *begin > capacity {
            *begin = *end - capacity;
        }

        drop(state);
        self.written.notify_all();
        Ok(len)
    }

    /// Copy bytes starting at absolute position `pos` into `buf`.
    ///
    /// Succeeds only when all of `pos..pos + buf.len()` has been ingested;
    /// even then it stops at the wrap boundary, so the result may be shorter
    /// than `buf`. An empty `buf` inside the window yields `Ok(0)`.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Evicted`] if `pos` is older than the window
    /// - [`CacheError::WouldBlock`] if the span extends past the cached end
    /// - [`CacheError::NotOpen`] if the arena is not allocated
    pub fn read(&self, pos: u64, buf: &mut [u8]) -> Result<usize, CacheError> {
        let state = self.state.lock();
        let arena = state.arena.as_ref().ok_or(CacheError::NotOpen)?;

        if pos < state.begin {
            return Err(CacheError::Evicted {
                position: pos,
                begin: state.begin,
            });
        }
        if pos.saturating_add(buf.len() as u64) > state.end {
            return Err(CacheError::WouldBlock {
                position: pos,
                end: state.end,
            });
        }

        if buf.is_empty() {
            return Ok(0);
        }

        let slot = self.slot(pos);
        let len = buf.len().min(self.capacity - slot);
        arena.copy_out(slot, &mut buf[..len]);
        Ok(len)
    }

    /// Block until at least `minimum` bytes are available from `pos` or
    /// `timeout` elapses, then return what is available.
    ///
    /// The result can be short of `minimum` on timeout. `minimum` is clamped
    /// to the capacity; a zero `timeout` returns immediately. The deadline is
    /// best-effort and may be overshot by up to one poll quantum.
    pub fn wait_for_data(&self, pos: u64, minimum: usize, timeout: Duration) -> u64 {
        let mut state = self.state.lock();
        let avail = state.end.saturating_sub(pos);
        if timeout.is_zero() {
            return avail;
        }

        let minimum = minimum.min(self.capacity) as u64;
        self.wait_until(&mut state, timeout, |s| s.end.saturating_sub(pos) >= minimum);
        state.end.saturating_sub(pos)
    }

    /// Validate `pos` as a read position.
    ///
    /// A target up to the slack window past the cached end first waits
    /// (bounded) for the producer to reach it, which avoids a seek on the
    /// live source. Anything inside `begin..=end` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::OutOfRange`] if `pos` is outside the window once
    /// any wait is over.
    pub fn seek(&self, pos: u64) -> Result<u64, CacheError> {
        let mut state = self.state.lock();

        let end = state.end;
        if pos >= end && pos < end.saturating_add(self.seek_slack) {
            trace!(position = pos, end, "Seek ahead of cache, waiting for producer");
            self.wait_until(&mut state, self.seek_wait, |s| s.end >= pos);
        }

        if pos >= state.begin && pos <= state.end {
            return Ok(pos);
        }

        Err(CacheError::OutOfRange {
            position: pos,
            begin: state.begin,
            end: state.end,
        })
    }

    /// Absolute position one past the newest cached byte.
    pub fn cached_data_end_pos(&self) -> u64 {
        self.state.lock().end
    }

    /// Returns `true` if `begin <= pos <= end`.
    pub fn is_cached_position(&self, pos: u64) -> bool {
        let state = self.state.lock();
        pos >= state.begin && pos <= state.end
    }

    /// Current retained window.
    pub fn cached_range(&self) -> Range<u64> {
        let state = self.state.lock();
        state.begin..state.end
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot(&self, pos: u64) -> usize {
        (pos % self.capacity as u64) as usize
    }

    /// Wait on the write signal in poll-sized slices until `ready` holds or
    /// `timeout` has elapsed. The lock is released while waiting.
    fn wait_until<F>(&self, state: &mut MutexGuard<'_, CacheState>, timeout: Duration, ready: F)
    where
        F: Fn(&CacheState) -> bool,
    {
        let deadline = Instant::now() + timeout;
        while !ready(&**state) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let quantum = self.poll_interval.min(deadline - now);
            self.written.wait_for(state, quantum);
        }
    }
}

impl Drop for RingCache {
    fn drop(&mut self) {
        self.close();
    }
}
