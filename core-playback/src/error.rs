//! # Playback Error Types
//!
//! Error types for the timeshift cache and the stream readers built on it.

use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Outcomes of a ring cache call other than a byte count.
///
/// None of these abort the cache: a caller that gets `Evicted` or
/// `WouldBlock` can keep using the same instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The requested position was already overwritten by newer data.
    #[error("Position {position} evicted from cache (oldest retained byte is {begin})")]
    Evicted { position: u64, begin: u64 },

    /// The requested span has not been fully ingested yet.
    #[error("Data at {position} not available yet (cache ends at {end})")]
    WouldBlock { position: u64, end: u64 },

    /// Seek target lies outside the retained window.
    #[error("Position {position} outside cached range [{begin}, {end}]")]
    OutOfRange { position: u64, begin: u64, end: u64 },

    /// The fixed-size arena could not be allocated.
    #[error("Failed to allocate {capacity} byte cache arena")]
    Allocation { capacity: usize },

    /// The cache was used before `open` or after `close`.
    #[error("Cache is not open")]
    NotOpen,
}

impl CacheError {
    /// Returns `true` if waiting and retrying can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::WouldBlock { .. })
    }
}

/// Errors that can occur while serving a live or timeshifted stream.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Ring cache rejected the request.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Evicted from the cache and never written to the backing store.
    #[error("Position {position} missing from backing store (store holds {stored} bytes)")]
    StoreGap { position: u64, stored: u64 },

    /// Waited for live data that did not arrive in time.
    #[error("Timed out after {waited:?} waiting for data at {position}")]
    Timeout { position: u64, waited: Duration },

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Seeking is not supported for this stream.
    #[error("Seeking not supported")]
    SeekNotSupported,

    /// Seek target is negative or past the ingested length.
    #[error("Seek target {target} out of bounds (length {length})")]
    SeekOutOfBounds { target: i64, length: u64 },

    /// Reader was used before `start` succeeded, or after it stopped.
    #[error("Stream not started")]
    NotStarted,

    /// No live stream is open.
    #[error("No live stream open")]
    NoStream,

    // ========================================================================
    // Platform/Bridge Errors
    // ========================================================================
    /// A collaborator the reader needs was not provided.
    #[error("Capability missing: {0}")]
    CapabilityMissing(String),

    /// Upstream source or backing store failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Invalid timeshift configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Cache(e) => e.is_transient(),
            PlaybackError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if a bounded wait for live data expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PlaybackError::Timeout { .. })
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
