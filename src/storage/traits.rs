//! Storage traits and error types
//!
//! This module defines the trait interface for durable store backends and
//! associated error types.

use crate::model::Asset;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("Archive {name} failed integrity check (expected {expected}, got {actual})")]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid timestamp in store: {0}")]
    InvalidTimestamp(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of the corpus and the prebuilt search index archive
///
/// Implementations must be shareable across threads; the crawler writes while
/// the search cache reads. Methods block, so async callers should run them on
/// `tokio::task::spawn_blocking`.
pub trait DurableStore: Send + Sync {
    // ===== Corpus =====

    /// Replaces the stored corpus with `assets`
    ///
    /// Stored order follows `assets`; a later asset with an already seen
    /// game id replaces the earlier one. Bumps the corpus update time.
    fn put_corpus(&self, assets: &[Asset]) -> StorageResult<()>;

    /// Returns the stored corpus in stored order
    fn get_corpus(&self) -> StorageResult<Vec<Asset>>;

    /// Returns when the corpus was last written, or `None` if never
    fn corpus_update_time(&self) -> StorageResult<Option<DateTime<Utc>>>;

    // ===== Archives =====

    /// Stores a file or directory tree under `name` as a compressed bundle
    fn put_archive(&self, source: &Path, name: &str) -> StorageResult<()>;

    /// Extracts the bundle stored under `name` below `dest_dir`
    ///
    /// # Returns
    ///
    /// The path of the extracted root file or directory
    fn get_archive(&self, name: &str, dest_dir: &Path) -> StorageResult<PathBuf>;
}
