//! # Timeshift Configuration
//!
//! Tuning for the ring cache and the timeshift buffer built on it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeshift buffer configuration.
///
/// Built once and handed to [`TimeshiftBuffer`](crate::timeshift::TimeshiftBuffer)
/// at construction; the buffer never re-reads it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeshiftConfig {
    /// Ring cache capacity in bytes.
    ///
    /// Must be a multiple of `chunk_size`.
    ///
    /// Default: 32 MiB.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Bytes requested from the upstream source per ingest iteration.
    ///
    /// Default: 32 KiB.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// How far past the cached end a cache seek waits for the producer
    /// instead of failing.
    ///
    /// Default: 100 000 bytes.
    #[serde(default = "default_seek_slack_bytes")]
    pub seek_slack_bytes: u64,

    /// Upper bound on a cache seek's wait inside the slack window.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_seek_wait")]
    pub seek_wait: Duration,

    /// Upper bound on a read's wait for live data.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// Poll quantum for waiters; bounds how late a missed wakeup is noticed.
    ///
    /// Default: 50 ms.
    #[serde(default = "default_wait_poll_interval")]
    pub wait_poll_interval: Duration,

    /// Name of the backing store file inside the buffer directory.
    ///
    /// Default: `tsbuffer.ts`.
    #[serde(default = "default_buffer_file_name")]
    pub buffer_file_name: String,
}

impl Default for TimeshiftConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            chunk_size: default_chunk_size(),
            seek_slack_bytes: default_seek_slack_bytes(),
            seek_wait: default_seek_wait(),
            read_timeout: default_read_timeout(),
            wait_poll_interval: default_wait_poll_interval(),
            buffer_file_name: default_buffer_file_name(),
        }
    }
}

impl TimeshiftConfig {
    /// Create a configuration for memory-constrained hosts.
    ///
    /// - 4 MiB cache (128 chunks)
    /// - Everything else as default
    pub fn low_memory() -> Self {
        Self {
            cache_capacity: default_chunk_size() * 128,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("Invalid timeshift config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.chunk_size > self.cache_capacity {
            return Err("chunk_size cannot exceed cache_capacity".to_string());
        }

        if self.cache_capacity % self.chunk_size != 0 {
            return Err("cache_capacity must be a multiple of chunk_size".to_string());
        }

        if self.wait_poll_interval.is_zero() {
            return Err("wait_poll_interval must be > 0".to_string());
        }

        if self.buffer_file_name.is_empty() {
            return Err("buffer_file_name cannot be empty".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_cache_capacity() -> usize {
    default_chunk_size() * 1024 // 32 MiB
}

fn default_chunk_size() -> usize {
    32 * 1024
}

fn default_seek_slack_bytes() -> u64 {
    100_000
}

fn default_seek_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_wait_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_buffer_file_name() -> String {
    "tsbuffer.ts".to_string()
}

// ============================================================================
// Timeshift State
// ============================================================================

/// Lifecycle of a timeshift buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeshiftState {
    /// Constructed; nothing ingested yet.
    Created,
    /// Ingest worker running.
    Started,
    /// Worker joined and backing store truncated.
    Stopped,
}

impl TimeshiftState {
    /// Returns `true` while the ingest worker runs.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started)
    }
}

/// Counters describing a timeshift session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeshiftStats {
    /// Bytes pulled from upstream and mirrored.
    pub bytes_ingested: u64,
    /// Non-empty upstream reads.
    pub chunks_ingested: u64,
    /// Extra cache writes needed because a chunk straddled the wrap boundary.
    pub short_cache_writes: u64,
    /// Upstream reads that produced nothing.
    pub empty_upstream_reads: u64,
    /// Reads served from the ring cache.
    pub cache_reads: u64,
    /// Reads that fell back to the backing store.
    pub store_reads: u64,
    /// Reads that gave up waiting for live data.
    pub read_timeouts: u64,
    /// Appends that left the backing store incomplete.
    pub store_append_failures: u64,
}

impl TimeshiftStats {
    /// Fraction of reads that had to go to the backing store (0.0 to 1.0).
    pub fn store_fallback_ratio(&self) -> f64 {
        let total = self.cache_reads + self.store_reads;
        if total == 0 {
            return 0.0;
        }
        self.store_reads as f64 / total as f64
    }
}
