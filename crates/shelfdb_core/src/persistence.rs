//! Disk persistence: one file per record, written asynchronously.
//!
//! ```text
//! <root>/
//! ├─ TestThing/
//! │  └─ 123.db        # "{ id: 123 }"
//! └─ TestThing2/
//!    ├─ 1.db
//!    └─ 42.db
//! ```
//!
//! [`DiskPersistence`] rebuilds partitions from these files at startup and,
//! once attached to a database, turns every change event into a write or
//! delete task on its [`ActionQueue`]. Callers return as soon as the
//! in-memory change is applied; the file catches up when the queue reaches
//! the task. Data changed in memory but not yet written is lost on an
//! unclean shutdown.

use crate::change::{ChangeEvent, ChangeSink, ChangeType};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::queue::ActionQueue;
use crate::record::Entity;
use crate::schema::Schema;
use crate::set::ConcurrentSet;
use shelfdb_storage::{validate_partition_name, FileStore, RecordStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Persists partitions to a [`RecordStore`] through an [`ActionQueue`].
///
/// One backend owns one queue, so writes across all of its partitions are
/// applied in the order the mutations happened.
///
/// # Example
///
/// ```rust,ignore
/// use shelfdb_core::{Database, DiskPersistence};
/// use std::sync::Arc;
///
/// let persistence = DiskPersistence::open("out/db")?;
/// let mut schema = persistence.create_initial_empty_map();
/// persistence.update_schema::<Thing>(&mut schema)?;
///
/// let db = Database::persisted(schema, Arc::new(persistence));
/// ```
pub struct DiskPersistence {
    config: Config,
    store: Arc<dyn RecordStore>,
    queue: ActionQueue,
}

impl DiskPersistence {
    /// Opens a backend over a directory with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the queue
    /// worker cannot be started.
    pub fn open(root: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(Config::new().root(root.as_ref()))
    }

    /// Opens a file-backed backend with custom configuration.
    pub fn open_with_config(config: Config) -> CoreResult<Self> {
        let store = FileStore::open(&config.root)?.sync_writes(config.sync_writes);
        Self::with_store(Arc::new(store), config)
    }

    /// Creates a backend over any record store.
    ///
    /// `config.root` is informational here; the store decides where
    /// records live.
    pub fn with_store(store: Arc<dyn RecordStore>, config: Config) -> CoreResult<Self> {
        let queue = ActionQueue::start(config.queue_name.clone())?;
        Ok(Self {
            config,
            store,
            queue,
        })
    }

    /// Returns an empty schema to fill partition by partition.
    #[must_use]
    pub fn create_initial_empty_map(&self) -> Schema {
        Schema::new()
    }

    /// Rebuilds the partition of `R` from its files.
    ///
    /// Every file in `<root>/<R::PARTITION>/` is read in full and decoded
    /// with [`Entity::deserialize`]. Blank files are skipped as harmless
    /// partial writes. The partition directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Deserialize`] naming the first file that fails
    /// to decode, together with its contents. No partial set is returned.
    pub fn recover<R: Entity>(&self) -> CoreResult<ConcurrentSet<R>> {
        self.recover_partition::<R>(R::PARTITION)
    }

    /// Rebuilds a set of `R` from the files of the partition `partition`.
    ///
    /// Use this for partitions registered under a name other than
    /// [`Entity::PARTITION`]; records are written to the directory named
    /// after the registered partition.
    ///
    /// # Errors
    ///
    /// As [`DiskPersistence::recover`], plus a storage error if `partition`
    /// is not a valid directory name.
    pub fn recover_partition<R: Entity>(&self, partition: &str) -> CoreResult<ConcurrentSet<R>> {
        validate_partition_name(partition)?;
        self.store.ensure_partition(partition)?;
        let files = self.store.read_partition(partition)?;

        let set = ConcurrentSet::new();
        let mut skipped = 0usize;
        for file in files {
            let content = String::from_utf8_lossy(&file.bytes);
            if self.config.skip_blank_files && content.trim().is_empty() {
                debug!(location = %file.location.display(), "skipping blank record file");
                skipped += 1;
                continue;
            }

            let record = match R::deserialize(&content) {
                Ok(record) => record,
                Err(source) => {
                    error!(
                        location = %file.location.display(),
                        error = %source,
                        "failed to deserialize record file"
                    );
                    return Err(CoreError::deserialize(
                        file.location.clone(),
                        content.into_owned(),
                        source,
                    ));
                }
            };

            let id = record.id();
            if file.stem() != Some(id.as_u64().to_string().as_str()) {
                warn!(
                    location = %file.location.display(),
                    %id,
                    "record identifier does not match its file name"
                );
            }
            if !set.add(record) {
                warn!(location = %file.location.display(), %id, "duplicate record identifier ignored");
            }
        }

        info!(partition, records = set.len(), skipped, "recovered partition");
        Ok(set)
    }

    /// Recovers `R` and binds the rebuilt set under [`Entity::PARTITION`].
    ///
    /// A set of the same type already in the schema is replaced. On error
    /// the schema is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeConflict`] if the partition name is bound to
    /// another type, or any error from [`DiskPersistence::recover`].
    pub fn update_schema<R: Entity>(&self, schema: &mut Schema) -> CoreResult<()> {
        self.update_schema_as::<R>(schema, R::PARTITION)
    }

    /// Recovers `R` from the partition `name` and binds it under `name`.
    ///
    /// The counterpart of [`Schema::register`] with a custom name: the
    /// partition directory and the schema key are both `name`.
    pub fn update_schema_as<R: Entity>(&self, schema: &mut Schema, name: &str) -> CoreResult<()> {
        schema.check_type::<R>(name)?;
        let set = self.recover_partition::<R>(name)?;
        schema.insert_set(name, set)
    }

    /// Returns the queue the write and delete tasks run on.
    pub fn action_queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Returns the underlying record store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the configured root directory.
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Stops the queue after all pending writes have been applied.
    pub fn stop(&self) {
        self.queue.stop();
    }
}

impl<R: Entity> ChangeSink<R> for DiskPersistence {
    fn accept(&self, event: ChangeEvent<R>) -> CoreResult<()> {
        let store = Arc::clone(&self.store);
        let ChangeEvent {
            partition,
            change_type,
            record,
        } = event;
        let id = record.id().as_u64();

        match change_type {
            ChangeType::Add | ChangeType::Update => {
                self.queue.enqueue(move || {
                    let contents = record.serialize();
                    store.write_record(&partition, id, &contents)?;
                    Ok(())
                })?;
            }
            ChangeType::Remove => {
                self.queue.enqueue(move || {
                    store.delete_record(&partition, id)?;
                    Ok(())
                })?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiskPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskPersistence")
            .field("root", &self.config.root)
            .field("queue", &self.queue)
            .finish()
    }
}
