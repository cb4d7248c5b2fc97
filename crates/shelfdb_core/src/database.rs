//! Database facade and data access handles.

use crate::change::ChangeTrackingSet;
use crate::error::CoreResult;
use crate::persistence::DiskPersistence;
use crate::record::Entity;
use crate::schema::Schema;
use crate::set::Snapshot;
use std::sync::Arc;
use tracing::info;

/// The main database handle.
///
/// A `Database` owns a [`Schema`] and, optionally, the
/// [`DiskPersistence`] backend its partitions report changes to. All
/// reads and writes go through typed [`DataAccess`] handles.
///
/// # Opening a Database
///
/// ```rust,ignore
/// use shelfdb_core::{Database, DiskPersistence};
/// use std::sync::Arc;
///
/// let persistence = Arc::new(DiskPersistence::open("out/db")?);
/// let mut schema = persistence.create_initial_empty_map();
/// persistence.update_schema::<Thing>(&mut schema)?;
///
/// let db = Database::persisted(schema, persistence);
/// let things = db.data_access::<Thing>("Thing")?;
/// let id = things.act_on(|set| set.allocate_id());
/// things.act_on(|set| set.add(Thing::new(id)))?;
/// ```
///
/// # In-Memory Databases
///
/// ```rust,ignore
/// let mut schema = Schema::new();
/// schema.register::<Thing>("Thing")?;
/// let db = Database::in_memory(schema);
/// ```
pub struct Database {
    schema: Schema,
    persistence: Option<Arc<DiskPersistence>>,
}

/// Per-partition figures reported by [`Database::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStats {
    /// Partition name.
    pub name: String,
    /// Name of the record type stored in the partition.
    pub type_name: &'static str,
    /// Number of records currently held in memory.
    pub records: usize,
}

impl Database {
    /// Creates a database over a schema.
    ///
    /// With a backend, every partition reports its changes to it; without
    /// one, the database is memory-only.
    pub fn new(schema: Schema, persistence: Option<Arc<DiskPersistence>>) -> Self {
        if let Some(persistence) = &persistence {
            for (_, entry) in schema.entries() {
                entry.set.attach_erased(persistence);
            }
            info!(
                partitions = schema.len(),
                root = %persistence.root().display(),
                "database opened with disk persistence"
            );
        }
        Self {
            schema,
            persistence,
        }
    }

    /// Creates a memory-only database.
    pub fn in_memory(schema: Schema) -> Self {
        Self::new(schema, None)
    }

    /// Creates a database persisted by `persistence`.
    pub fn persisted(schema: Schema, persistence: Arc<DiskPersistence>) -> Self {
        Self::new(schema, Some(persistence))
    }

    /// Returns a typed handle to the partition registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PartitionNotFound`] if nothing is registered
    /// under `name`, or [`CoreError::TypeConflict`] naming both types if the
    /// partition holds a type other than `R`.
    ///
    /// [`CoreError::PartitionNotFound`]: crate::CoreError::PartitionNotFound
    /// [`CoreError::TypeConflict`]: crate::CoreError::TypeConflict
    pub fn data_access<R: Entity>(&self, name: &str) -> CoreResult<DataAccess<R>> {
        let set = self.schema.typed::<R>(name)?;
        Ok(DataAccess { set })
    }

    /// Returns the partition names in sorted order.
    pub fn partition_names(&self) -> Vec<&str> {
        self.schema.names()
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the persistence backend, if any.
    pub fn persistence(&self) -> Option<&Arc<DiskPersistence>> {
        self.persistence.as_ref()
    }

    /// Returns record counts for every partition.
    pub fn stats(&self) -> Vec<PartitionStats> {
        self.schema
            .entries()
            .map(|(name, entry)| PartitionStats {
                name: name.to_string(),
                type_name: entry.tag.name(),
                records: entry.set.record_count(),
            })
            .collect()
    }

    /// Stops the persistence queue once every pending write is applied.
    ///
    /// Later mutations still change memory but fail with
    /// [`CoreError::QueueClosed`](crate::CoreError::QueueClosed).
    pub fn shutdown(&self) {
        if let Some(persistence) = &self.persistence {
            persistence.stop();
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema", &self.schema)
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

/// Typed handle to one partition.
///
/// Cloning is cheap; all clones share the same set.
pub struct DataAccess<R: Entity> {
    set: Arc<ChangeTrackingSet<R>>,
}

impl<R: Entity> DataAccess<R> {
    /// Runs `action` against the live set, returning its result.
    ///
    /// Mutations made here are visible to later calls immediately and, on
    /// a persisted database, are queued for disk.
    pub fn act_on<T>(&self, action: impl FnOnce(&ChangeTrackingSet<R>) -> T) -> T {
        action(&self.set)
    }

    /// Runs `action` against a point-in-time copy of the records.
    ///
    /// Mutations made while `action` runs are not observed.
    pub fn read<T>(&self, action: impl FnOnce(&Snapshot<R>) -> T) -> T {
        let snapshot = self.set.snapshot();
        action(&snapshot)
    }

    /// Returns the partition name.
    pub fn partition(&self) -> &str {
        self.set.partition()
    }
}

impl<R: Entity> Clone for DataAccess<R> {
    fn clone(&self) -> Self {
        Self {
            set: Arc::clone(&self.set),
        }
    }
}

impl<R: Entity> std::fmt::Debug for DataAccess<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAccess")
            .field("partition", &self.set.partition())
            .field("records", &self.set.len())
            .finish()
    }
}
