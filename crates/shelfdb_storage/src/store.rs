//! Record store trait definition.

use crate::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};

/// File extension of every record file.
pub const RECORD_EXTENSION: &str = "db";

/// The raw contents of one record file, as found during a partition scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Where the record lives (a file path for [`crate::FileStore`]).
    pub location: PathBuf,
    /// The full, undecoded file contents.
    pub bytes: Vec<u8>,
}

impl StoredRecord {
    /// Returns the file name without its extension, if it is valid UTF-8.
    #[must_use]
    pub fn stem(&self) -> Option<&str> {
        self.location.file_stem().and_then(|s| s.to_str())
    }
}

/// A store of record files partitioned by entity type.
///
/// # Invariants
///
/// - A partition holds at most one file per identifier
/// - `write_record` replaces the whole file; there are no partial edits
/// - `read_partition` returns files sorted by name
/// - Stores must be `Send + Sync`; the persistence worker owns the writes
pub trait RecordStore: Send + Sync {
    /// Writes `contents` as the complete file for `(partition, id)`.
    ///
    /// The partition directory is created if needed and any existing file
    /// is overwritten.
    fn write_record(&self, partition: &str, id: u64, contents: &str) -> StorageResult<()>;

    /// Deletes the file for `(partition, id)`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingRecord`] if no such file exists.
    fn delete_record(&self, partition: &str, id: u64) -> StorageResult<()>;

    /// Reads every file in a partition. A missing partition is empty.
    fn read_partition(&self, partition: &str) -> StorageResult<Vec<StoredRecord>>;

    /// Creates the partition directory if it does not exist.
    fn ensure_partition(&self, partition: &str) -> StorageResult<()>;

    /// Lists the partitions present in the store, sorted by name.
    fn partitions(&self) -> StorageResult<Vec<String>>;

    /// Returns the location the record `(partition, id)` is stored at.
    fn record_location(&self, partition: &str, id: u64) -> PathBuf;
}

/// Returns the file name for a record identifier, e.g. `123.db`.
#[must_use]
pub fn record_file_name(id: u64) -> String {
    format!("{id}.{RECORD_EXTENSION}")
}

/// Checks that a partition name is usable as a single directory name.
pub fn validate_partition_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::invalid_partition(name, "name is empty"));
    }
    if name == "." || name == ".." {
        return Err(StorageError::invalid_partition(name, "name is a relative path"));
    }
    if name.contains(['/', '\\']) || Path::new(name).components().count() != 1 {
        return Err(StorageError::invalid_partition(
            name,
            "name must be a single path component",
        ));
    }
    Ok(())
}
