//! Search Cache Engine
//!
//! Holds the published snapshot of the corpus together with its derived
//! [`SearchIndex`], refreshes it from the durable store and answers paginated
//! browse and ranked query reads.

mod cache;
mod index;
mod tokenizer;

pub use cache::{paginate, CacheStats, SearchCache, Snapshot};
pub use index::{Field, Hit, SearchIndex, Tier};
pub use tokenizer::{analyzer, tokenize, tokenize_query, ANALYZER_NAME};

use crate::storage::StorageError;
use thiserror::Error;

/// Errors from building, loading or querying a search index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Search engine error: {0}")]
    Engine(#[from] tantivy::TantivyError),

    #[error("Index schema has no field '{0}'")]
    Schema(String),
}

/// Errors surfaced by the cache engine
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Page {page} is out of range ({total} results)")]
    OutOfRange { page: usize, total: usize },

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Refresh failed: {0}")]
    Refresh(#[from] StorageError),

    #[error("Index build failed: {0}")]
    Index(#[from] IndexError),

    #[error("Refresh task failed: {0}")]
    RefreshTask(String),
}
