//! # Live Playback & Timeshift Module
//!
//! Serves live streams to the player, with optional pause and rewind.
//!
//! ## Overview
//!
//! This module handles:
//! - A fixed-capacity ring cache addressed by absolute stream position
//! - A background ingest worker mirroring the live source into the cache and
//!   an unbounded backing store
//! - A timeshift buffer serving reads from the cache, falling back to the
//!   backing store for evicted bytes
//! - A live session deciding when a stream gets a timeshift buffer, and
//!   serving finished recordings alongside it

mod arena;

pub mod config;
pub mod error;
pub mod ingest;
pub mod live;
pub mod recording;
pub mod ring_cache;
pub mod session;
pub mod timeshift;
pub mod traits;

pub use config::{TimeshiftConfig, TimeshiftState, TimeshiftStats};
pub use error::{CacheError, PlaybackError, Result};
pub use ingest::{IngestTargets, IngestWorker, StoreExtent};
pub use live::LiveStreamReader;
pub use recording::RecordingReader;
pub use ring_cache::RingCache;
pub use session::LiveSession;
pub use timeshift::TimeshiftBuffer;
pub use traits::{ReaderSource, StreamReader};
