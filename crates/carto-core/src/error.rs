//! Error types for Carto operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used across
//! all Carto crates. Uses `thiserror` for derive macros.
//!
//! Errors fall into three families that callers are expected to treat
//! differently:
//!
//! - **Usage errors** ([`Error::InvalidInput`], [`Error::DimensionMismatch`]):
//!   the caller passed well-typed but malformed input. Never retried.
//! - **Storage errors** ([`Error::Storage`], [`Error::Io`], [`Error::IoWithPath`]):
//!   the durable store failed. An ingestion batch logs these and moves on.
//! - **Index errors** ([`Error::Index`]): the approximate index rejected a write.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in Carto operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// The underlying I/O error.
        source: std::io::Error,
        /// The path being accessed.
        path: PathBuf,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data or format (persisted state that cannot be decoded).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Malformed caller input (empty identifiers, mismatched lengths).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A vector whose length differs from the index dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality the index or batch was configured with.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// Durable store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Approximate index failure.
    #[error("Index error: {0}")]
    Index(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic operation failure.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// An operation exceeded its time budget. Safe to retry.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// What was running.
        operation: String,
        /// The budget that was exceeded.
        seconds: u64,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create an invalid input (usage) error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }

    /// Create a generic operation error.
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Wrap an I/O error with the path that produced it.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoWithPath {
            source,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Whether this error was caused by malformed caller input.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::DimensionMismatch { .. })
    }

    /// Whether this error came from the durable store or the filesystem.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_) | Self::IoWithPath { .. })
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using Carto's Error type.
pub type Result<T> = std::result::Result<T, Error>;
