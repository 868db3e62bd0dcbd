//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the timeshift core:
//! - Logging and tracing infrastructure
//! - Host configuration (timeshift mode, buffer location, injected bridges)
//!
//! ## Overview
//!
//! Configuration is built once by the host and passed down by value; nothing
//! in the core reads process-wide settings.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, TimeshiftMode};
pub use error::{Error, Result};
