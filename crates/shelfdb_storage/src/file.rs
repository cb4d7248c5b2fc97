//! File-based record store.

use crate::error::{StorageError, StorageResult};
use crate::store::{record_file_name, validate_partition_name, RecordStore, StoredRecord};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A record store keeping one file per record under a root directory.
///
/// Each partition is a subdirectory of the root and each record is a file
/// named `<id>.db` holding the record's text encoding. There is no header,
/// checksum or version marker: a file's existence and contents are the
/// whole record.
///
/// # Durability
///
/// Writes go through the OS page cache. With `sync_writes` enabled every
/// written file is `sync_all`ed before the write returns.
///
/// # Thread Safety
///
/// The store holds no mutable state; concurrent callers operating on
/// different records never interfere. Callers that need ordering between
/// writes to the same record must serialize them.
///
/// # Example
///
/// ```no_run
/// use shelfdb_storage::{FileStore, RecordStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("out/db")).unwrap();
/// store.write_record("Thing", 123, "{ id: 123 }").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    sync_writes: bool,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or `root`
    /// exists but is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory: {}", root.display()),
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            sync_writes: false,
        })
    }

    /// Sets whether each write is synced to disk before returning.
    #[must_use]
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of a partition.
    #[must_use]
    pub fn partition_dir(&self, partition: &str) -> PathBuf {
        self.root.join(partition)
    }
}

impl RecordStore for FileStore {
    fn write_record(&self, partition: &str, id: u64, contents: &str) -> StorageResult<()> {
        self.ensure_partition(partition)?;
        let path = self.record_location(partition, id);
        let mut file = File::create(&path)?;
        file.write_all(contents.as_bytes())?;
        if self.sync_writes {
            file.sync_all()?;
        }
        Ok(())
    }

    fn delete_record(&self, partition: &str, id: u64) -> StorageResult<()> {
        validate_partition_name(partition)?;
        let path = self.record_location(partition, id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::missing_record(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_partition(&self, partition: &str) -> StorageResult<Vec<StoredRecord>> {
        validate_partition_name(partition)?;
        let dir = self.partition_dir(partition);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for location in paths {
            let bytes = fs::read(&location)?;
            records.push(StoredRecord { location, bytes });
        }
        Ok(records)
    }

    fn ensure_partition(&self, partition: &str) -> StorageResult<()> {
        validate_partition_name(partition)?;
        fs::create_dir_all(self.partition_dir(partition))?;
        Ok(())
    }

    fn partitions(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn record_location(&self, partition: &str, id: u64) -> PathBuf {
        self.partition_dir(partition).join(record_file_name(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("db");

        let store = FileStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root);
    }

    #[test]
    fn open_rejects_file_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("plain.txt");
        fs::write(&root, "not a dir").unwrap();

        assert!(FileStore::open(&root).is_err());
    }

    #[test]
    fn write_and_read_partition() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.write_record("Thing", 2, "{ id: 2 }").unwrap();
        store.write_record("Thing", 1, "{ id: 1 }").unwrap();

        let records = store.read_partition("Thing").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].location, dir.path().join("Thing").join("1.db"));
        assert_eq!(records[0].bytes, b"{ id: 1 }");
        assert_eq!(records[1].bytes, b"{ id: 2 }");
    }

    #[test]
    fn write_overwrites_whole_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.write_record("Thing", 1, "a much longer first version").unwrap();
        store.write_record("Thing", 1, "short").unwrap();

        let contents = fs::read_to_string(store.record_location("Thing", 1)).unwrap();
        assert_eq!(contents, "short");
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.write_record("Thing", 5, "{ id: 5 }").unwrap();
        store.delete_record("Thing", 5).unwrap();

        assert!(!store.record_location("Thing", 5).exists());
        assert!(store.read_partition("Thing").unwrap().is_empty());
    }

    #[test]
    fn delete_missing_file_fails() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.ensure_partition("Thing").unwrap();

        let result = store.delete_record("Thing", 1234);
        match result {
            Err(StorageError::MissingRecord { location }) => {
                assert_eq!(location, dir.path().join("Thing").join("1234.db"));
            }
            other => panic!("expected MissingRecord, got {other:?}"),
        }
    }

    #[test]
    fn missing_partition_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.read_partition("Nothing").unwrap().is_empty());
    }

    #[test]
    fn read_partition_skips_subdirectories() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.write_record("Thing", 1, "{ id: 1 }").unwrap();
        fs::create_dir(dir.path().join("Thing").join("nested")).unwrap();

        assert_eq!(store.read_partition("Thing").unwrap().len(), 1);
    }

    #[test]
    fn partitions_are_listed_sorted() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.ensure_partition("Zebra").unwrap();
        store.ensure_partition("Apple").unwrap();
        fs::write(dir.path().join("stray.txt"), "x").unwrap();

        assert_eq!(store.partitions().unwrap(), vec!["Apple", "Zebra"]);
    }

    #[test]
    fn invalid_partition_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let result = store.write_record("../escape", 1, "x");
        assert!(matches!(result, Err(StorageError::InvalidPartition { .. })));
    }

    #[test]
    fn synced_writes() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap().sync_writes(true);

        store.write_record("Thing", 9, "{ id: 9 }").unwrap();
        assert_eq!(store.read_partition("Thing").unwrap().len(), 1);
    }
}
