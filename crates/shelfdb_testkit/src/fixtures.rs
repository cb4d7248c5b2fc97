//! Sample record types and temporary database helpers.

use shelfdb_core::{
    CoreResult, Database, DiskPersistence, Entity, RecordId, Schema, TextFields, TextRecord,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A record with nothing but an identifier. Encodes as `{ id: N }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestThing {
    /// Record identifier.
    pub id: RecordId,
}

impl TestThing {
    /// Creates a record with the given identifier.
    pub fn new(id: u64) -> Self {
        Self {
            id: RecordId::new(id),
        }
    }
}

impl Entity for TestThing {
    const PARTITION: &'static str = "TestThing";

    fn id(&self) -> RecordId {
        self.id
    }

    fn serialize(&self) -> String {
        TextRecord::new().field("id", self.id.as_u64()).finish()
    }

    fn deserialize(text: &str) -> CoreResult<Self> {
        Ok(Self {
            id: TextFields::parse(text)?.id()?,
        })
    }
}

/// A record with two text fields, `c` (color) and `ic` (ice cream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestThing2 {
    /// Record identifier.
    pub id: RecordId,
    /// Favorite color.
    pub color: String,
    /// Favorite ice cream.
    pub ice_cream: String,
}

impl TestThing2 {
    /// Creates a record.
    pub fn new(id: u64, color: &str, ice_cream: &str) -> Self {
        Self {
            id: RecordId::new(id),
            color: color.to_string(),
            ice_cream: ice_cream.to_string(),
        }
    }
}

impl Entity for TestThing2 {
    const PARTITION: &'static str = "TestThing2";

    fn id(&self) -> RecordId {
        self.id
    }

    fn serialize(&self) -> String {
        TextRecord::new()
            .field("id", self.id.as_u64())
            .field("c", &self.color)
            .field("ic", &self.ice_cream)
            .finish()
    }

    fn deserialize(text: &str) -> CoreResult<Self> {
        let fields = TextFields::parse(text)?;
        Ok(Self {
            id: fields.id()?,
            color: fields.get("c")?.to_string(),
            ice_cream: fields.get("ic")?.to_string(),
        })
    }
}

/// A temporary database root with automatic cleanup.
pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    /// Creates an empty temporary root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the path of a file inside a partition.
    pub fn file(&self, partition: &str, name: &str) -> PathBuf {
        self.root().join(partition).join(name)
    }

    /// Writes raw bytes into a partition, bypassing the database.
    pub fn write_raw(&self, partition: &str, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.file(partition, name);
        fs::create_dir_all(self.root().join(partition)).expect("Failed to create partition");
        fs::write(&path, bytes).expect("Failed to write raw file");
        path
    }

    /// Opens a backend over the root.
    pub fn open_persistence(&self) -> Arc<DiskPersistence> {
        Arc::new(DiskPersistence::open(self.root()).expect("Failed to open persistence"))
    }

    /// Opens a database with [`TestThing`] and [`TestThing2`] recovered.
    pub fn open_database(&self) -> (Database, Arc<DiskPersistence>) {
        self.try_open_database().expect("Failed to recover database")
    }

    /// Like [`TestStore::open_database`], returning recovery errors.
    pub fn try_open_database(&self) -> CoreResult<(Database, Arc<DiskPersistence>)> {
        let persistence = Arc::new(DiskPersistence::open(self.root())?);
        let mut schema = persistence.create_initial_empty_map();
        persistence.update_schema::<TestThing>(&mut schema)?;
        persistence.update_schema::<TestThing2>(&mut schema)?;
        Ok((
            Database::persisted(schema, Arc::clone(&persistence)),
            persistence,
        ))
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a memory-only database with [`TestThing`] and [`TestThing2`].
pub fn memory_database() -> Database {
    let mut schema = Schema::new();
    schema
        .register_entity::<TestThing>()
        .expect("Failed to register TestThing");
    schema
        .register_entity::<TestThing2>()
        .expect("Failed to register TestThing2");
    Database::in_memory(schema)
}

/// Runs a test with a temporary memory-only database.
pub fn with_memory_db<F, T>(f: F) -> T
where
    F: FnOnce(&Database) -> T,
{
    let db = memory_database();
    f(&db)
}

/// Runs a test with a temporary persisted database, then shuts it down.
pub fn with_file_db<F, T>(f: F) -> T
where
    F: FnOnce(&Database, &Path) -> T,
{
    let store = TestStore::new();
    let (db, _) = store.open_database();
    let result = f(&db, store.root());
    db.shutdown();
    result
}
