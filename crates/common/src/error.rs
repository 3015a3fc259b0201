//! Common error types for the finalize engine.
//!
//! This module provides the unified error type [`enum@Error`] and the convenience
//! type alias [`Result`] used by configuration loading and identifier parsing.
//!
//! # Example
//!
//! ```rust
//! use finalize_common::{Error, Result};
//!
//! fn validate_data(data: &[u8]) -> Result<()> {
//!     if data.is_empty() {
//!         return Err(Error::InvalidData("data cannot be empty".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for finalize operations outside the engine core.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    ///
    /// Wraps standard I/O errors from file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    ///
    /// Occurs when configuration is invalid or cannot be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid data error.
    ///
    /// Occurs when data fails validation (wrong format, out of range, etc.).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),
}
