//! Concurrent indexed set of records.

use crate::record::{Entity, RecordId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe collection of records of one type, keyed by identifier.
///
/// All operations take `&self` and are safe to call from any number of
/// threads without external locking. The map is guarded by a short-lived
/// `RwLock`; no lock is held while callers iterate a [`Snapshot`].
///
/// # Identifiers
///
/// The set owns a monotonically increasing counter starting at 1.
/// [`ConcurrentSet::allocate_id`] hands out fresh identifiers, and every
/// insert moves the counter past the inserted identifier, so an identifier
/// is never handed out twice, even after its record is removed.
#[derive(Debug)]
pub struct ConcurrentSet<R: Entity> {
    records: RwLock<HashMap<RecordId, R>>,
    next_id: AtomicU64,
}

impl<R: Entity> ConcurrentSet<R> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh identifier for a record about to be created.
    pub fn allocate_id(&self) -> RecordId {
        RecordId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Inserts a record unless one with the same identifier exists.
    ///
    /// Returns `true` if the record was inserted. A duplicate identifier
    /// leaves the stored record untouched and returns `false`.
    pub fn add(&self, record: R) -> bool {
        let id = record.id();
        self.next_id
            .fetch_max(id.as_u64().saturating_add(1), Ordering::SeqCst);

        let mut records = self.records.write();
        if records.contains_key(&id) {
            return false;
        }
        records.insert(id, record);
        true
    }

    /// Replaces the record with the same identifier, if one is stored.
    ///
    /// Returns `true` if a record was replaced.
    pub fn update(&self, record: R) -> bool {
        match self.records.write().get_mut(&record.id()) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Removes the record with the same identifier as `record`.
    ///
    /// Returns `true` if something was removed.
    pub fn remove(&self, record: &R) -> bool {
        self.remove_id(record.id()).is_some()
    }

    /// Removes a record by identifier, returning it.
    pub fn remove_id(&self, id: RecordId) -> Option<R> {
        self.records.write().remove(&id)
    }

    /// Returns a copy of the record with the given identifier.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<R> {
        self.records.read().get(&id).cloned()
    }

    /// Returns true if a record with the identifier is stored.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.records.read().contains_key(&id)
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns a point-in-time copy of the set, ordered by identifier.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<R> {
        let mut records: Vec<R> = self.records.read().values().cloned().collect();
        records.sort_by_key(|r| r.id());
        Snapshot { records }
    }
}

impl<R: Entity> Default for ConcurrentSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Entity> FromIterator<R> for ConcurrentSet<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let set = Self::new();
        for record in iter {
            set.add(record);
        }
        set
    }
}

/// An immutable point-in-time copy of a set's records.
///
/// Records are ordered by identifier. Later mutations of the live set are
/// not visible through a snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    records: Vec<R>,
}

impl<R: Entity> Snapshot<R> {
    /// Returns the record with the given identifier.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&R> {
        self.records
            .binary_search_by_key(&id, |r| r.id())
            .ok()
            .map(|i| &self.records[i])
    }

    /// Returns the identifiers in the snapshot.
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id()).collect()
    }

    /// Consumes the snapshot, returning the records.
    #[must_use]
    pub fn into_vec(self) -> Vec<R> {
        self.records
    }
}

impl<R> Deref for Snapshot<R> {
    type Target = [R];

    fn deref(&self) -> &[R] {
        &self.records
    }
}

impl<R> IntoIterator for Snapshot<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, R> IntoIterator for &'a Snapshot<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
