//! # Core Configuration Module
//!
//! Host-level configuration for live playback with timeshifting.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! that carries the timeshift mode, the buffer location and the bridges the
//! core needs to open backing stores and read the clock. The value is built
//! once and handed to the playback layer; changing a setting means building a
//! new config for the next session.
//!
//! ## Required Dependencies
//!
//! - `BackingStoreProvider` - Required whenever timeshifting is enabled
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Session timestamps (default: `SystemClock`)
//!
//! When the `desktop-shims` feature is enabled, a file-backed provider rooted
//! at `buffer_dir` (or the platform cache directory) is injected automatically
//! if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TimeshiftMode};
//!
//! let config = CoreConfig::builder()
//!     .timeshift_mode(TimeshiftMode::OnPause)
//!     .buffer_dir("/var/cache/tv")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TimeshiftMode};
//!
//! // Without desktop shims this fails with an actionable CapabilityMissing error
//! let config = CoreConfig::builder()
//!     .timeshift_mode(TimeshiftMode::OnPlayback)
//!     .build();
//! ```

use crate::error::{Error, Result};
use bridge_traits::{BackingStoreProvider, Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// When a live stream gets a timeshift buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeshiftMode {
    /// Live streams are read directly; pause and seek are unavailable.
    #[default]
    Off,
    /// Every live stream is buffered from the moment it opens.
    OnPlayback,
    /// Live streams are read directly until the viewer pauses.
    OnPause,
}

impl TimeshiftMode {
    /// Map the integer stored by host settings (0 = off, 1 = on playback,
    /// 2 = on pause).
    pub fn from_setting(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::OnPlayback),
            2 => Some(Self::OnPause),
            _ => None,
        }
    }

    /// Returns `true` unless timeshifting is switched off.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Core configuration for live playback.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// When to put a timeshift buffer in front of the live stream
    pub timeshift_mode: TimeshiftMode,

    /// Directory holding the timeshift buffer file, if one was configured
    pub buffer_dir: Option<PathBuf>,

    /// Opens backing stores for timeshift sessions (required unless mode is `Off`)
    pub store_provider: Option<Arc<dyn BackingStoreProvider>>,

    /// Time source for session timestamps
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("timeshift_mode", &self.timeshift_mode)
            .field("buffer_dir", &self.buffer_dir)
            .field(
                "store_provider",
                &self
                    .store_provider
                    .as_ref()
                    .map(|_| "BackingStoreProvider { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The buffer directory, when set, is not empty
    /// - A store provider is present whenever timeshifting is enabled
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.buffer_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config(
                    "Timeshift buffer directory cannot be empty".to_string(),
                ));
            }
        }

        if self.timeshift_mode.is_enabled() && self.store_provider.is_none() {
            return Err(Error::CapabilityMissing {
                capability: "BackingStoreProvider".to_string(),
                message: format!(
                    "Timeshift mode {:?} needs a backing store provider. \
                     Desktop: enable the desktop-shims feature. \
                     Other hosts: inject a provider with .store_provider().",
                    self.timeshift_mode
                ),
            });
        }

        Ok(())
    }

    /// Returns `true` if a timeshift buffer can be created right now.
    pub fn buffer_available(&self) -> bool {
        self.store_provider
            .as_ref()
            .map(|provider| provider.is_available())
            .unwrap_or(false)
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    timeshift_mode: Option<TimeshiftMode>,
    buffer_dir: Option<PathBuf>,
    store_provider: Option<Arc<dyn BackingStoreProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Sets the timeshift mode.
    ///
    /// Default: [`TimeshiftMode::Off`]
    pub fn timeshift_mode(mut self, mode: TimeshiftMode) -> Self {
        self.timeshift_mode = Some(mode);
        self
    }

    /// Sets the directory for the timeshift buffer file.
    pub fn buffer_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.buffer_dir = Some(path.into());
        self
    }

    /// Sets the backing store provider.
    pub fn store_provider(mut self, provider: Arc<dyn BackingStoreProvider>) -> Self {
        self.store_provider = Some(provider);
        self
    }

    /// Sets the clock used for session timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the configuration, injecting platform defaults where allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (see [`CoreConfig::validate`]).
    pub fn build(self) -> Result<CoreConfig> {
        let store_provider = match self.store_provider {
            Some(provider) => Some(provider),
            None => provide_default_store_provider(self.buffer_dir.as_deref()),
        };

        let config = CoreConfig {
            timeshift_mode: self.timeshift_mode.unwrap_or_default(),
            buffer_dir: self.buffer_dir,
            store_provider,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_store_provider(
    buffer_dir: Option<&Path>,
) -> Option<Arc<dyn BackingStoreProvider>> {
    let provider = match buffer_dir {
        Some(dir) => bridge_desktop::FileStoreProvider::with_directory(dir),
        None => bridge_desktop::FileStoreProvider::new(),
    };
    Some(Arc::new(provider))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_store_provider(
    _buffer_dir: Option<&Path>,
) -> Option<Arc<dyn BackingStoreProvider>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BackingStore, BridgeError};

    struct MockProvider {
        available: bool,
    }

    impl BackingStoreProvider for MockProvider {
        fn is_available(&self) -> bool {
            self.available
        }

        fn open_store(&self, _file_name: &str) -> BridgeResult<Box<dyn BackingStore>> {
            Err(BridgeError::NotAvailable("mock".to_string()))
        }
    }

    #[test]
    fn test_timeshift_mode_from_setting() {
        assert_eq!(TimeshiftMode::from_setting(0), Some(TimeshiftMode::Off));
        assert_eq!(TimeshiftMode::from_setting(1), Some(TimeshiftMode::OnPlayback));
        assert_eq!(TimeshiftMode::from_setting(2), Some(TimeshiftMode::OnPause));
        assert_eq!(TimeshiftMode::from_setting(3), None);
        assert!(!TimeshiftMode::Off.is_enabled());
        assert!(TimeshiftMode::OnPause.is_enabled());
    }

    #[test]
    fn test_builder_defaults_to_off() {
        let config = CoreConfig::builder().build().unwrap();
        assert_eq!(config.timeshift_mode, TimeshiftMode::Off);
        assert!(config.buffer_dir.is_none());
    }

    #[test]
    fn test_builder_with_custom_provider() {
        let config = CoreConfig::builder()
            .timeshift_mode(TimeshiftMode::OnPlayback)
            .store_provider(Arc::new(MockProvider { available: true }))
            .build()
            .unwrap();

        assert!(config.buffer_available());
    }

    #[test]
    fn test_buffer_unavailable_when_provider_reports_missing_dir() {
        let config = CoreConfig::builder()
            .timeshift_mode(TimeshiftMode::OnPause)
            .store_provider(Arc::new(MockProvider { available: false }))
            .build()
            .unwrap();

        assert!(!config.buffer_available());
    }

    #[test]
    fn test_validate_rejects_empty_buffer_dir() {
        let result = CoreConfig::builder()
            .buffer_dir("")
            .store_provider(Arc::new(MockProvider { available: true }))
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("buffer directory cannot be empty"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_enabled_mode_requires_provider() {
        let result = CoreConfig::builder()
            .timeshift_mode(TimeshiftMode::OnPlayback)
            .build();

        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_default_provider_uses_buffer_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig::builder()
            .timeshift_mode(TimeshiftMode::OnPlayback)
            .buffer_dir(dir.path())
            .build()
            .unwrap();

        assert!(config.buffer_available());

        let missing = CoreConfig::builder()
            .timeshift_mode(TimeshiftMode::OnPlayback)
            .buffer_dir(dir.path().join("missing"))
            .build()
            .unwrap();
        assert!(!missing.buffer_available());
    }

    #[test]
    fn test_config_debug_hides_bridges() {
        let config = CoreConfig::builder()
            .store_provider(Arc::new(MockProvider { available: true }))
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(debug.contains("BackingStoreProvider { ... }"));
        assert!(debug.contains("Clock { ... }"));
    }
}
