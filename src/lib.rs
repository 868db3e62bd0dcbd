//! Workspace facade crate.
//!
//! Re-exports the member crates so a host can depend on `timeshift-workspace`
//! alone and pick the platform shims through feature flags instead of wiring
//! `core-runtime`, `core-playback` and the bridge crates individually.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
