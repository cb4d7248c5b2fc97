//! Change tracking for record sets.
//!
//! A [`ChangeTrackingSet`] applies every mutation to its inner
//! [`ConcurrentSet`] first and, only when the set actually changed, hands a
//! [`ChangeEvent`] to its sink. The disk persistence backend is the usual
//! sink; without one the set is memory-only and no events are produced.
//!
//! # Usage
//!
//! ```rust,ignore
//! use shelfdb_core::{ChangeTrackingSet, ChannelSink};
//! use std::sync::Arc;
//!
//! let things = ChangeTrackingSet::<Thing>::new("Thing");
//! let (sink, events) = ChannelSink::new();
//! things.attach_sink(Arc::new(sink));
//!
//! things.add(thing)?;
//! let event = events.recv()?;
//! ```

use crate::error::CoreResult;
use crate::record::{Entity, RecordId};
use crate::set::{ConcurrentSet, Snapshot};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Record was inserted.
    Add,
    /// Record replaced a stored record with the same identifier.
    Update,
    /// Record was removed.
    Remove,
}

/// One applied mutation, consumed once by the persistence pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<R> {
    /// Partition the record belongs to.
    pub partition: Arc<str>,
    /// Type of change.
    pub change_type: ChangeType,
    /// The record as added or updated, or as stored before removal.
    pub record: R,
}

impl<R: Entity> ChangeEvent<R> {
    /// Creates an add event.
    pub fn add(partition: Arc<str>, record: R) -> Self {
        Self {
            partition,
            change_type: ChangeType::Add,
            record,
        }
    }

    /// Creates an update event.
    pub fn update(partition: Arc<str>, record: R) -> Self {
        Self {
            partition,
            change_type: ChangeType::Update,
            record,
        }
    }

    /// Creates a remove event.
    pub fn remove(partition: Arc<str>, record: R) -> Self {
        Self {
            partition,
            change_type: ChangeType::Remove,
            record,
        }
    }

    /// Returns the identifier of the changed record.
    pub fn id(&self) -> RecordId {
        self.record.id()
    }
}

/// Receiver of change events from a [`ChangeTrackingSet`].
pub trait ChangeSink<R: Entity>: Send + Sync {
    /// Accepts one event.
    ///
    /// Called on the mutating thread right after the in-memory change,
    /// while the set holds its write-order lock. Implementations must not
    /// block on I/O or mutate the same set.
    fn accept(&self, event: ChangeEvent<R>) -> CoreResult<()>;
}

/// A sink forwarding every event to an mpsc channel.
///
/// Useful for observing a partition's changes from another thread.
pub struct ChannelSink<R> {
    sender: Mutex<Sender<ChangeEvent<R>>>,
}

impl<R: Entity> ChannelSink<R> {
    /// Creates a sink and the receiver its events arrive on.
    pub fn new() -> (Self, Receiver<ChangeEvent<R>>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(tx),
            },
            rx,
        )
    }
}

impl<R: Entity> ChangeSink<R> for ChannelSink<R> {
    fn accept(&self, event: ChangeEvent<R>) -> CoreResult<()> {
        // A dropped receiver just means nobody is watching.
        let _ = self.sender.lock().send(event);
        Ok(())
    }
}

/// A [`ConcurrentSet`] that reports its mutations to a sink.
///
/// Mutations are serialized with their events: the sink receives events in
/// exactly the order the changes were applied in memory, even when several
/// threads change the same record. Reads never take that lock.
pub struct ChangeTrackingSet<R: Entity> {
    partition: Arc<str>,
    inner: ConcurrentSet<R>,
    sink: RwLock<Option<Arc<dyn ChangeSink<R>>>>,
    write_order: Mutex<()>,
}

impl<R: Entity> ChangeTrackingSet<R> {
    /// Creates an empty set for a partition.
    pub fn new(partition: impl Into<Arc<str>>) -> Self {
        Self::from_set(partition, ConcurrentSet::new())
    }

    /// Wraps an existing set, e.g. one rebuilt by recovery.
    pub fn from_set(partition: impl Into<Arc<str>>, inner: ConcurrentSet<R>) -> Self {
        Self {
            partition: partition.into(),
            inner,
            sink: RwLock::new(None),
            write_order: Mutex::new(()),
        }
    }

    /// Returns the partition name.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Sets the sink that receives change events, replacing any previous one.
    pub fn attach_sink(&self, sink: Arc<dyn ChangeSink<R>>) {
        *self.sink.write() = Some(sink);
    }

    /// Returns true if a sink is attached.
    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    /// Allocates a fresh identifier for a new record.
    pub fn allocate_id(&self) -> RecordId {
        self.inner.allocate_id()
    }

    /// Inserts a record unless its identifier is already stored.
    ///
    /// Returns `Ok(false)` for a duplicate identifier; no event is produced.
    ///
    /// # Errors
    ///
    /// Returns the sink's error (e.g. a stopped persistence queue). The
    /// in-memory insert has already happened at that point.
    pub fn add(&self, record: R) -> CoreResult<bool> {
        let _order = self.write_order.lock();
        if !self.inner.add(record.clone()) {
            return Ok(false);
        }
        self.emit(ChangeEvent::add(Arc::clone(&self.partition), record))?;
        Ok(true)
    }

    /// Replaces a stored record with the same identifier.
    ///
    /// Returns `Ok(false)` if nothing was stored under that identifier.
    pub fn update(&self, record: R) -> CoreResult<bool> {
        let _order = self.write_order.lock();
        if !self.inner.update(record.clone()) {
            return Ok(false);
        }
        self.emit(ChangeEvent::update(Arc::clone(&self.partition), record))?;
        Ok(true)
    }

    /// Removes the record with the same identifier.
    ///
    /// Returns `Ok(false)` if nothing was stored; no event is produced.
    pub fn remove(&self, record: &R) -> CoreResult<bool> {
        let _order = self.write_order.lock();
        match self.inner.remove_id(record.id()) {
            Some(removed) => {
                self.emit(ChangeEvent::remove(Arc::clone(&self.partition), removed))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns a copy of the record with the given identifier.
    pub fn get(&self, id: RecordId) -> Option<R> {
        self.inner.get(id)
    }

    /// Returns true if a record with the identifier is stored.
    pub fn contains(&self, id: RecordId) -> bool {
        self.inner.contains(id)
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns a point-in-time copy of the records.
    pub fn snapshot(&self) -> Snapshot<R> {
        self.inner.snapshot()
    }

    fn emit(&self, event: ChangeEvent<R>) -> CoreResult<()> {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.accept(event),
            None => Ok(()),
        }
    }
}

impl<R: Entity> std::fmt::Debug for ChangeTrackingSet<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTrackingSet")
            .field("partition", &self.partition)
            .field("records", &self.inner.len())
            .finish_non_exhaustive()
    }
}
