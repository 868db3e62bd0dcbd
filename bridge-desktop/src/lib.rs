//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `BackingStore` using a plain buffer file with separate read/write handles
//! - `BackingStoreProvider` rooted at the platform cache directory
//! - `UpstreamSource` using blocking `reqwest`
//! - `RecordedSource` over a local file or an HTTP URL with `Range` requests
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileStoreProvider, HttpUpstream};
//! use bridge_traits::{BackingStoreProvider, UpstreamSource};
//!
//! let provider = FileStoreProvider::with_directory("/var/cache/tv");
//! let store = provider.open_store("tsbuffer.ts")?;
//! let upstream = HttpUpstream::new("http://tuner.local:8089/upnp/channelstream/1.ts");
//! ```

mod filesystem;
mod http;

pub use filesystem::{FileBackingStore, FileRecording, FileStoreProvider};
pub use http::{HttpRecording, HttpUpstream};
