//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record file to delete does not exist.
    #[error("no such record file: {}", .location.display())]
    MissingRecord {
        /// Where the record was expected.
        location: PathBuf,
    },

    /// The partition name cannot be used as a directory name.
    #[error("invalid partition name {name:?}: {reason}")]
    InvalidPartition {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A failure injected by a test harness.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl StorageError {
    /// Creates a missing record error.
    pub fn missing_record(location: impl Into<PathBuf>) -> Self {
        Self::MissingRecord {
            location: location.into(),
        }
    }

    /// Creates an invalid partition error.
    pub fn invalid_partition(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPartition {
            name: name.into(),
            reason,
        }
    }
}
