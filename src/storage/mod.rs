//! Storage module for the durable corpus and index archives
//!
//! This module handles everything that outlives a process, including:
//! - SQLite database initialization and schema management
//! - Whole-corpus replacement and its last-write timestamp
//! - Compressed, checksummed archives of the prebuilt search index

mod archive;
mod schema;
mod sqlite;
mod traits;

pub use archive::{pack, unpack};
pub use sqlite::SqliteStore;
pub use traits::{DurableStore, StorageError, StorageResult};
