//! # shelfdb Core
//!
//! Embedded record store for shelfdb.
//!
//! This crate provides:
//! - Concurrent in-memory record sets, one per partition
//! - Change tracking that reports every mutation to a sink
//! - An ordered single-consumer action queue
//! - Disk persistence with one file per record and startup recovery
//! - A schema registry with type-checked data access
//!
//! # Usage
//!
//! ```rust,ignore
//! use shelfdb_core::{Database, DiskPersistence};
//! use std::sync::Arc;
//!
//! let persistence = Arc::new(DiskPersistence::open("out/db")?);
//! let mut schema = persistence.create_initial_empty_map();
//! persistence.update_schema::<Thing>(&mut schema)?;
//!
//! let db = Database::persisted(schema, persistence);
//! let things = db.data_access::<Thing>("Thing")?;
//! let count = things.read(|snapshot| snapshot.len());
//! db.shutdown();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod config;
mod database;
mod error;
mod persistence;
mod queue;
mod record;
mod schema;
mod set;

pub use change::{ChangeEvent, ChangeSink, ChangeTrackingSet, ChangeType, ChannelSink};
pub use config::Config;
pub use database::{DataAccess, Database, PartitionStats};
pub use error::{CoreError, CoreResult};
pub use persistence::DiskPersistence;
pub use queue::{ActionQueue, QueueStats, TaskHandle, TaskStatus};
pub use record::{Entity, RecordId, TextFields, TextRecord, TypeTag};
pub use schema::Schema;
pub use set::{ConcurrentSet, Snapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
