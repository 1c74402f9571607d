//! Assetgrep: a harvested, searchable mirror of a paginated asset listing
//!
//! This crate periodically crawls a rate-limited, paginated remote listing into
//! a complete corpus, persists it, and serves it through paginated browsing and
//! ranked full-text search backed by an in-memory snapshot.

pub mod config;
pub mod crawler;
pub mod model;
pub mod search;
pub mod storage;
pub mod web;

use thiserror::Error;

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Asset, IndexedAsset};
pub use search::SearchCache;
