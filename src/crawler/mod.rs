//! Crawler module for harvesting the remote listing
//!
//! This module contains the harvesting side of Assetgrep, including:
//! - HTTP fetching of the count summary and listing pages with retry logic
//! - Parsing listing pages into assets
//! - Concurrent fan-out/fan-in crawl orchestration with progress reporting
//! - The harvest pipeline that persists a crawl and its prebuilt index

mod coordinator;
mod fetcher;
mod harvest;
mod parser;
mod progress;

pub use coordinator::{page_count, spread_delay, CrawlOrchestrator, CrawlOutcome};
pub use fetcher::{
    build_http_client, Backoff, ListingPage, ListingSource, SourceClient, MAX_BACKOFF_SECS,
};
pub use harvest::{HarvestReport, Harvester};
pub use parser::{extract_item_count, parse_item_count, HtmlAssetParser, PageParser};
pub use progress::{CrawlProgress, ProgressSnapshot};

use crate::search::IndexError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors from a single round trip to the remote listing
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error for {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("Rate limited by {url}")]
    RateLimited { url: String },

    #[error("Unexpected status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("No item count found in '{text}'")]
    MissingCount { text: String },

    #[error("Gave up on {url} after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },

    #[error("Invalid listing URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    /// Returns true for failures the retry loop absorbs
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::RateLimited { .. })
    }
}

/// Errors produced while turning page content into assets
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid selector '{0}'")]
    Selector(String),
}

/// Errors from a crawl or harvest run
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Item count probe failed: {0}")]
    CountProbe(FetchError),

    #[error("First page probe failed: {0}")]
    FirstPage(FetchError),

    #[error("First page reported zero items per page")]
    EmptyFirstPage,

    #[error("Fetching page {page} failed: {source}")]
    PageFetch { page: u64, source: FetchError },

    #[error("Parsing page {page} failed: {source}")]
    PageParse { page: u64, source: ParseError },

    #[error("A harvest is already running")]
    AlreadyRunning,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index build failed: {0}")]
    Index(#[from] IndexError),

    #[error("Harvest task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
