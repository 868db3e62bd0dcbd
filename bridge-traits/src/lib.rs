//! # Host Bridge Traits
//!
//! Collaborator abstractions the timeshift core consumes but does not own.
//!
//! ## Overview
//!
//! The core only knows how to cache and serve bytes. Where those bytes come
//! from, where the unbounded on-disk copy lives and what time it is are host
//! concerns, expressed here as traits and implemented per platform.
//!
//! ## Traits
//!
//! ### Stream I/O
//! - [`UpstreamSource`](stream::UpstreamSource) - Blocking chunked producer of the live stream
//! - [`RecordedSource`](stream::RecordedSource) - Finite random-access source for recordings
//! - [`BackingStore`](storage::BackingStore) - Unbounded append/read store addressed by absolute position
//! - [`BackingStoreProvider`](storage::BackingStoreProvider) - Opens a fresh store per timeshift session
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert platform errors into it and keep the
//! offending path or URL in the message.
//!
//! ## Thread Safety
//!
//! `BackingStore`, `BackingStoreProvider` and `Clock` are `Send + Sync`: the
//! ingest worker appends while consumer threads read. `UpstreamSource` is only
//! `Send` because a single worker thread owns it for its whole life.

pub mod error;
pub mod storage;
pub mod stream;
pub mod time;

pub use error::BridgeError;

pub use storage::{BackingStore, BackingStoreProvider};
pub use stream::{RecordedSource, UpstreamSource};
pub use time::{Clock, SystemClock};
