//! Error types for HashDB
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using HashDbError
pub type Result<T> = std::result::Result<T, HashDbError>;

/// Unified error type for HashDB operations
///
/// A missing key is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum HashDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create database at {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Database corruption detected: {0}")]
    Corruption(String),

    #[error("Record too large: key is {key_len} bytes, value is {value_len} bytes")]
    RecordTooLarge { key_len: usize, value_len: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HashDbError {
    /// Returns true for errors caused by on-disk data that fails validation
    pub fn is_corruption(&self) -> bool {
        matches!(self, HashDbError::Corruption(_))
    }
}
