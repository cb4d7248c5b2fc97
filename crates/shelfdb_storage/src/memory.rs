//! In-memory record store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::{record_file_name, validate_partition_name, RecordStore, StoredRecord};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An in-memory record store.
///
/// Keeps partitions in a sorted map so scans come back in a stable order.
/// Locations are synthesized as `<partition>/<id>.db`.
///
/// # Example
///
/// ```rust
/// use shelfdb_storage::{InMemoryStore, RecordStore};
///
/// let store = InMemoryStore::new();
/// store.write_record("Thing", 7, "{ id: 7 }").unwrap();
/// assert_eq!(store.record_count("Thing"), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    partitions: RwLock<BTreeMap<String, BTreeMap<u64, String>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the contents stored for a record, if any.
    #[must_use]
    pub fn contents(&self, partition: &str, id: u64) -> Option<String> {
        self.partitions
            .read()
            .get(partition)
            .and_then(|records| records.get(&id).cloned())
    }

    /// Returns the number of records in a partition.
    #[must_use]
    pub fn record_count(&self, partition: &str) -> usize {
        self.partitions
            .read()
            .get(partition)
            .map_or(0, BTreeMap::len)
    }

    /// Removes everything from the store.
    pub fn clear(&self) {
        self.partitions.write().clear();
    }
}

impl RecordStore for InMemoryStore {
    fn write_record(&self, partition: &str, id: u64, contents: &str) -> StorageResult<()> {
        validate_partition_name(partition)?;
        self.partitions
            .write()
            .entry(partition.to_string())
            .or_default()
            .insert(id, contents.to_string());
        Ok(())
    }

    fn delete_record(&self, partition: &str, id: u64) -> StorageResult<()> {
        validate_partition_name(partition)?;
        let removed = self
            .partitions
            .write()
            .get_mut(partition)
            .and_then(|records| records.remove(&id));
        match removed {
            Some(_) => Ok(()),
            None => Err(StorageError::missing_record(
                self.record_location(partition, id),
            )),
        }
    }

    fn read_partition(&self, partition: &str) -> StorageResult<Vec<StoredRecord>> {
        validate_partition_name(partition)?;
        let partitions = self.partitions.read();
        let Some(records) = partitions.get(partition) else {
            return Ok(Vec::new());
        };
        // Sort by file name to match directory scans, where "10.db" < "2.db".
        let mut stored: Vec<StoredRecord> = records
            .iter()
            .map(|(id, contents)| StoredRecord {
                location: self.record_location(partition, *id),
                bytes: contents.as_bytes().to_vec(),
            })
            .collect();
        stored.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(stored)
    }

    fn ensure_partition(&self, partition: &str) -> StorageResult<()> {
        validate_partition_name(partition)?;
        self.partitions
            .write()
            .entry(partition.to_string())
            .or_default();
        Ok(())
    }

    fn partitions(&self) -> StorageResult<Vec<String>> {
        Ok(self.partitions.read().keys().cloned().collect())
    }

    fn record_location(&self, partition: &str, id: u64) -> PathBuf {
        PathBuf::from(partition).join(record_file_name(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read() {
        let store = InMemoryStore::new();
        store.write_record("Thing", 1, "{ id: 1 }").unwrap();

        let records = store.read_partition("Thing").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, PathBuf::from("Thing/1.db"));
        assert_eq!(store.contents("Thing", 1).as_deref(), Some("{ id: 1 }"));
    }

    #[test]
    fn scan_order_matches_file_names() {
        let store = InMemoryStore::new();
        store.write_record("Thing", 2, "two").unwrap();
        store.write_record("Thing", 10, "ten").unwrap();

        let records = store.read_partition("Thing").unwrap();
        assert_eq!(records[0].bytes, b"ten");
        assert_eq!(records[1].bytes, b"two");
    }

    #[test]
    fn delete_missing_fails() {
        let store = InMemoryStore::new();
        let result = store.delete_record("Thing", 3);
        assert!(matches!(result, Err(StorageError::MissingRecord { .. })));
    }

    #[test]
    fn delete_existing() {
        let store = InMemoryStore::new();
        store.write_record("Thing", 3, "x").unwrap();
        store.delete_record("Thing", 3).unwrap();
        assert_eq!(store.record_count("Thing"), 0);
    }

    #[test]
    fn partitions_listed() {
        let store = InMemoryStore::new();
        store.ensure_partition("B").unwrap();
        store.write_record("A", 1, "x").unwrap();
        assert_eq!(store.partitions().unwrap(), vec!["A", "B"]);

        store.clear();
        assert!(store.partitions().unwrap().is_empty());
    }
}
