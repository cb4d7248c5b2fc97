//! # shelfdb Storage
//!
//! Record store trait and implementations for shelfdb.
//!
//! A record store is an **opaque text store** keyed by partition name and
//! record identifier. It knows the on-disk layout but never interprets the
//! contents it stores; encoding and decoding belong to the entity types.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├─ <partition>/
//! │  ├─ 1.db
//! │  └─ 2.db
//! └─ <partition>/
//!    └─ 7.db
//! ```
//!
//! ## Available Stores
//!
//! - [`FileStore`] - one file per record under a root directory
//! - [`InMemoryStore`] - for testing and benchmarks
//!
//! ## Example
//!
//! ```rust
//! use shelfdb_storage::{InMemoryStore, RecordStore};
//!
//! let store = InMemoryStore::new();
//! store.write_record("Thing", 1, "{ id: 1 }").unwrap();
//! let records = store.read_partition("Thing").unwrap();
//! assert_eq!(records[0].bytes, b"{ id: 1 }");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::{record_file_name, validate_partition_name, RecordStore, StoredRecord, RECORD_EXTENSION};
