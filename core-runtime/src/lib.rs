//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the catalog tracker:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate holds the settings and logging conventions every other crate
//! relies on. It has no knowledge of repositories beyond their kind names.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{RateLimitConfig, TrackerConfig, TrackerConfigBuilder};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
