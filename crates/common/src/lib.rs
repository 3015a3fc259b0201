//! Common types and utilities for the finalize engine.
//!
//! This crate provides shared types used across all finalize crates:
//!
//! - [`Hash256`]: the content identifier type behind mapping, key, value and
//!   transition identifiers
//! - [`Config`]: node configuration loaded from TOML with environment overrides
//! - [`enum@Error`]: the common error type
//! - [`protocol`]: names of the native credits program and its fee functions

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::{Config, DatabaseConfig, FinalizeConfig, LogFormat, LogLevel, LoggingConfig};
pub use error::{Error, Result};
pub use types::*;
