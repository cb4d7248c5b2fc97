//! Fault injection for record stores.
//!
//! [`FaultyStore`] wraps another [`RecordStore`] and fails writes or
//! deletes on demand. It is used to check that a failing task is recorded
//! on the queue without stopping later ones, and to simulate a process
//! that dies between updating memory and reaching disk.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shelfdb_testkit::faults::FaultyStore;
//!
//! let store = Arc::new(FaultyStore::new(Arc::new(InMemoryStore::new())));
//! store.fail_writes_after(2);
//! ```

use parking_lot::Mutex;
use shelfdb_storage::{RecordStore, StorageError, StorageResult, StoredRecord};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A record store wrapper that fails operations on demand.
pub struct FaultyStore {
    inner: Arc<dyn RecordStore>,
    fail_writes_after: AtomicUsize,
    writes: AtomicUsize,
    truncate_failed_writes: AtomicBool,
    fail_deletes: AtomicBool,
    failures: Mutex<Vec<String>>,
}

impl FaultyStore {
    /// Wraps a store. No faults are armed.
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            fail_writes_after: AtomicUsize::new(usize::MAX),
            writes: AtomicUsize::new(0),
            truncate_failed_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Fails every write after the first `count` succeed.
    pub fn fail_writes_after(&self, count: usize) {
        self.fail_writes_after.store(count, Ordering::SeqCst);
    }

    /// Leaves an empty file behind when a write fails, as a crash
    /// between creating and filling the file would.
    pub fn set_truncate_failed_writes(&self, truncate: bool) {
        self.truncate_failed_writes.store(truncate, Ordering::SeqCst);
    }

    /// Sets whether deletes fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Disarms every fault and forgets recorded failures.
    pub fn reset(&self) {
        self.fail_writes_after.store(usize::MAX, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
        self.truncate_failed_writes.store(false, Ordering::SeqCst);
        self.fail_deletes.store(false, Ordering::SeqCst);
        self.failures.lock().clear();
    }

    /// Returns descriptions of the injected failures so far.
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }

    fn inject(&self, message: String) -> StorageError {
        self.failures.lock().push(message.clone());
        StorageError::Injected(message)
    }
}

impl RecordStore for FaultyStore {
    fn write_record(&self, partition: &str, id: u64, contents: &str) -> StorageResult<()> {
        let attempt = self.writes.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.fail_writes_after.load(Ordering::SeqCst) {
            if self.truncate_failed_writes.load(Ordering::SeqCst) {
                self.inner.write_record(partition, id, "")?;
            }
            return Err(self.inject(format!("write {partition}/{id}")));
        }
        self.inner.write_record(partition, id, contents)
    }

    fn delete_record(&self, partition: &str, id: u64) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(self.inject(format!("delete {partition}/{id}")));
        }
        self.inner.delete_record(partition, id)
    }

    fn read_partition(&self, partition: &str) -> StorageResult<Vec<StoredRecord>> {
        self.inner.read_partition(partition)
    }

    fn ensure_partition(&self, partition: &str) -> StorageResult<()> {
        self.inner.ensure_partition(partition)
    }

    fn partitions(&self) -> StorageResult<Vec<String>> {
        self.inner.partitions()
    }

    fn record_location(&self, partition: &str, id: u64) -> PathBuf {
        self.inner.record_location(partition, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TestThing, TestThing2};
    use shelfdb_core::{Config, CoreError, Database, DiskPersistence, TaskStatus};
    use shelfdb_storage::InMemoryStore;

    fn database_over(store: Arc<FaultyStore>) -> (Database, Arc<DiskPersistence>) {
        let persistence =
            Arc::new(DiskPersistence::with_store(store, Config::new()).unwrap());
        let mut schema = persistence.create_initial_empty_map();
        persistence.update_schema::<TestThing>(&mut schema).unwrap();
        persistence.update_schema::<TestThing2>(&mut schema).unwrap();
        (
            Database::persisted(schema, Arc::clone(&persistence)),
            persistence,
        )
    }

    #[test]
    fn failed_write_does_not_stop_the_queue() {
        let memory = Arc::new(InMemoryStore::new());
        let store = Arc::new(FaultyStore::new(memory.clone()));
        store.fail_writes_after(1);
        let (db, persistence) = database_over(Arc::clone(&store));
        let things = db.data_access::<TestThing>("TestThing").unwrap();

        let handles: Vec<_> = (1..=3)
            .map(|id| {
                things.act_on(|set| set.add(TestThing::new(id))).unwrap();
                persistence.action_queue().most_recent_task().unwrap()
            })
            .collect();

        assert!(matches!(handles[0].wait(), TaskStatus::Succeeded));
        assert!(matches!(handles[1].wait(), TaskStatus::Failed(_)));
        assert!(matches!(handles[2].wait(), TaskStatus::Failed(_)));
        assert_eq!(store.failures().len(), 2);
        assert_eq!(memory.record_count("TestThing"), 1);
        assert_eq!(things.act_on(|set| set.len()), 3);
    }

    #[test]
    fn truncated_write_is_skipped_on_recovery() {
        let memory = Arc::new(InMemoryStore::new());
        let store = Arc::new(FaultyStore::new(memory.clone()));
        store.fail_writes_after(0);
        store.set_truncate_failed_writes(true);
        let (db, persistence) = database_over(Arc::clone(&store));

        db.data_access::<TestThing2>("TestThing2")
            .unwrap()
            .act_on(|set| set.add(TestThing2::new(1, "blue", "vanilla")))
            .unwrap();
        db.shutdown();
        assert_eq!(memory.contents("TestThing2", 1).as_deref(), Some(""));

        assert!(persistence.recover::<TestThing2>().unwrap().is_empty());
    }

    #[test]
    fn failed_delete_keeps_the_file() {
        let memory = Arc::new(InMemoryStore::new());
        let store = Arc::new(FaultyStore::new(memory.clone()));
        let (db, persistence) = database_over(Arc::clone(&store));
        let things = db.data_access::<TestThing>("TestThing").unwrap();

        things.act_on(|set| set.add(TestThing::new(5))).unwrap();
        store.set_fail_deletes(true);
        things.act_on(|set| set.remove(&TestThing::new(5))).unwrap();

        let status = persistence.action_queue().most_recent_task().unwrap().wait();
        assert!(matches!(
            status.error(),
            Some(CoreError::Storage(StorageError::Injected(_)))
        ));
        assert!(memory.contents("TestThing", 5).is_some());
        assert!(!things.act_on(|set| set.contains(TestThing::new(5).id)));
    }

    #[test]
    fn reset_disarms_faults() {
        let store = FaultyStore::new(Arc::new(InMemoryStore::new()));
        store.fail_writes_after(0);
        store.set_fail_deletes(true);
        assert!(store.write_record("TestThing", 1, "{ id: 1 }").is_err());

        store.reset();
        assert!(store.failures().is_empty());
        store.write_record("TestThing", 1, "{ id: 1 }").unwrap();
        store.delete_record("TestThing", 1).unwrap();
    }
}
