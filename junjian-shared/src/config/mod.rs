//! # Configuration
//!
//! Client configuration resolved from defaults, an optional file, the
//! environment, and explicit overrides.

pub mod client;

pub use client::{ClientConfig, ConfigError};
