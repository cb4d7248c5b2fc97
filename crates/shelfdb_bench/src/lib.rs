//! Benchmark utilities.

#![warn(missing_docs)]

use rand::distributions::Alphanumeric;
use rand::Rng;
use shelfdb_core::{CoreResult, Database, DiskPersistence, Entity, RecordId, Schema, TextFields, TextRecord};
use std::path::Path;
use std::sync::Arc;

/// A record with a random text payload.
#[derive(Debug, Clone)]
pub struct BenchRecord {
    /// Record identifier.
    pub id: RecordId,
    /// Payload text.
    pub payload: String,
}

impl Entity for BenchRecord {
    const PARTITION: &'static str = "BenchRecord";

    fn id(&self) -> RecordId {
        self.id
    }

    fn serialize(&self) -> String {
        TextRecord::new()
            .field("id", self.id.as_u64())
            .field("payload", &self.payload)
            .finish()
    }

    fn deserialize(text: &str) -> CoreResult<Self> {
        let fields = TextFields::parse(text)?;
        Ok(Self {
            id: fields.id()?,
            payload: fields.get("payload")?.to_string(),
        })
    }
}

/// Generates a random alphanumeric payload of the specified length.
pub fn random_payload(size: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(size)
        .map(char::from)
        .collect()
}

/// Generates records with identifiers `1..=count`.
pub fn generate_records(count: usize, payload_size: usize) -> Vec<BenchRecord> {
    (1..=count as u64)
        .map(|id| BenchRecord {
            id: RecordId::new(id),
            payload: random_payload(payload_size),
        })
        .collect()
}

/// Creates a memory-only database with a `BenchRecord` partition.
pub fn memory_database() -> Database {
    let mut schema = Schema::new();
    schema
        .register_entity::<BenchRecord>()
        .expect("register BenchRecord");
    Database::in_memory(schema)
}

/// Opens a database persisted under `root`.
pub fn persisted_database(root: &Path) -> (Database, Arc<DiskPersistence>) {
    let persistence = Arc::new(DiskPersistence::open(root).expect("open persistence"));
    let mut schema = persistence.create_initial_empty_map();
    persistence
        .update_schema::<BenchRecord>(&mut schema)
        .expect("recover BenchRecord");
    (
        Database::persisted(schema, Arc::clone(&persistence)),
        persistence,
    )
}
