//! Error types for shelfdb core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in shelfdb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Record store error.
    #[error("storage error: {0}")]
    Storage(#[from] shelfdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A partition was requested as a different type than it holds.
    #[error("partition {partition:?} holds {registered}, while you requested it as {requested}")]
    TypeConflict {
        /// The partition name.
        partition: String,
        /// The type the caller asked for.
        requested: &'static str,
        /// The type the partition was registered with.
        registered: &'static str,
    },

    /// No partition is registered under the name.
    #[error("partition not found: {name}")]
    PartitionNotFound {
        /// The partition name.
        name: String,
    },

    /// A record file could not be decoded during recovery.
    #[error("failed to deserialize {} with data ({content})", .location.display())]
    Deserialize {
        /// The file that failed to decode.
        location: PathBuf,
        /// The raw file contents.
        content: String,
        /// What the decoder reported.
        #[source]
        source: Box<CoreError>,
    },

    /// Text did not match a record encoding.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the problem.
        message: String,
    },

    /// An action was submitted to a queue that has been stopped.
    #[error("attempting to add an action to stopped queue {queue}")]
    QueueClosed {
        /// The queue name.
        queue: String,
    },

    /// A queued task panicked.
    #[error("queued task panicked: {message}")]
    TaskPanicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a type conflict error.
    pub fn type_conflict(
        partition: impl Into<String>,
        requested: &'static str,
        registered: &'static str,
    ) -> Self {
        Self::TypeConflict {
            partition: partition.into(),
            requested,
            registered,
        }
    }

    /// Creates a partition not found error.
    pub fn partition_not_found(name: impl Into<String>) -> Self {
        Self::PartitionNotFound { name: name.into() }
    }

    /// Creates a recovery decode failure for a file.
    pub fn deserialize(location: impl Into<PathBuf>, content: impl Into<String>, source: CoreError) -> Self {
        Self::Deserialize {
            location: location.into(),
            content: content.into(),
            source: Box::new(source),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a queue closed error.
    pub fn queue_closed(queue: impl Into<String>) -> Self {
        Self::QueueClosed {
            queue: queue.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this is a missing record file reported by the store.
    #[must_use]
    pub fn is_missing_record(&self) -> bool {
        matches!(
            self,
            Self::Storage(shelfdb_storage::StorageError::MissingRecord { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_conflict_names_both_types() {
        let err = CoreError::type_conflict("things", "app::Other", "app::Thing");
        assert_eq!(
            err.to_string(),
            "partition \"things\" holds app::Thing, while you requested it as app::Other"
        );
    }

    #[test]
    fn deserialize_message_echoes_path_and_content() {
        let err = CoreError::deserialize(
            "out/db/TestThing2/bad.db",
            "\u{1}\u{2}\u{3}",
            CoreError::decode("expected '{'"),
        );
        assert_eq!(
            err.to_string(),
            "failed to deserialize out/db/TestThing2/bad.db with data (\u{1}\u{2}\u{3})"
        );
    }

    #[test]
    fn missing_record_detection() {
        let err = CoreError::from(shelfdb_storage::StorageError::missing_record("a/1.db"));
        assert!(err.is_missing_record());
        assert!(!CoreError::decode("x").is_missing_record());
    }
}
