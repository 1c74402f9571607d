//! Configuration module for Assetgrep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use assetgrep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("assetgrep.toml")).unwrap();
//! println!("Serving pages of {} assets", config.cache.page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, CrawlerConfig, IndexSource, ServerConfig, SourceConfig, StorageConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{apply_env_overrides, compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
