//! Crawl orchestration
//!
//! This module reconstructs the full remote listing:
//! - Probing the item count and the items-per-page of the first page
//! - Fanning out one task per page with jittered start times
//! - Fanning the per-page assets into a single corpus
//! - Reporting progress while tasks run
//!
//! A page that fails to fetch or parse only removes its own assets from the
//! result. Only the initial probes can fail the crawl.

use crate::config::CrawlerConfig;
use crate::crawler::progress::{observe, CrawlProgress};
use crate::crawler::{CrawlError, ListingSource, PageParser};
use crate::model::Asset;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};

/// Upper bound on buffered page results between producers and the collector
const MAX_CHANNEL_CAPACITY: usize = 256;

/// Result of a completed crawl
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Union of per-page assets, in arrival order, one entry per game id
    pub assets: Vec<Asset>,

    /// Number of pages dispatched
    pub page_count: u64,

    /// Pages whose assets are missing from `assets`, ascending
    pub failed_pages: Vec<u64>,
}

struct PageResult {
    page: u64,
    outcome: Result<Vec<Asset>, CrawlError>,
}

/// Number of pages needed to cover `total_items`
pub fn page_count(total_items: u64, items_per_page: u64) -> u64 {
    if items_per_page == 0 {
        return 0;
    }
    total_items.div_ceil(items_per_page)
}

/// Draws a start delay uniformly from `[0, page_count / spread_divisor]` seconds
pub fn spread_delay<R: Rng + ?Sized>(page_count: u64, spread_divisor: f64, rng: &mut R) -> Duration {
    let window = page_count as f64 / spread_divisor;
    if !(window > 0.0) || !window.is_finite() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rng.gen_range(0.0..=window))
}

/// Main crawl orchestrator
pub struct CrawlOrchestrator {
    source: Arc<dyn ListingSource>,
    parser: Arc<dyn PageParser>,
    config: CrawlerConfig,
}

impl CrawlOrchestrator {
    pub fn new(
        source: Arc<dyn ListingSource>,
        parser: Arc<dyn PageParser>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            source,
            parser,
            config,
        }
    }

    /// Runs a complete crawl
    ///
    /// 1. Probe the item count and the first page to plan `page_count` pages
    /// 2. Spawn one task per page; each sleeps a jittered delay, fetches,
    ///    parses and tags its assets with the page number
    /// 3. Log progress until every task has finished
    /// 4. Close the collector once all tasks are done and drain it
    pub async fn run(&self) -> Result<CrawlOutcome, CrawlError> {
        let start_time = Instant::now();

        let total_items = self
            .source
            .fetch_count()
            .await
            .map_err(CrawlError::CountProbe)?;
        let first = self
            .source
            .fetch_page(1)
            .await
            .map_err(CrawlError::FirstPage)?;
        if first.items_per_page == 0 {
            return Err(CrawlError::EmptyFirstPage);
        }

        let pages = page_count(total_items, first.items_per_page);
        tracing::info!(
            "Crawling {} items across {} pages ({} per page)",
            total_items,
            pages,
            first.items_per_page
        );

        if pages == 0 {
            return Ok(CrawlOutcome {
                assets: Vec::new(),
                page_count: 0,
                failed_pages: Vec::new(),
            });
        }

        let progress = Arc::new(CrawlProgress::new(pages));
        let capacity = usize::try_from(pages)
            .unwrap_or(MAX_CHANNEL_CAPACITY)
            .clamp(1, MAX_CHANNEL_CAPACITY);
        let (tx, mut rx) = mpsc::channel::<PageResult>(capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        let limiter = match self.config.max_concurrent_fetches {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        let observer = tokio::spawn(observe(
            progress.clone(),
            Duration::from_secs(self.config.progress_interval_secs),
            stop_rx,
        ));

        let mut handles = Vec::with_capacity(capacity);
        for page in 1..=pages {
            let delay = spread_delay(pages, self.config.spread_divisor, &mut rand::thread_rng());
            let source = self.source.clone();
            let parser = self.parser.clone();
            let progress = progress.clone();
            let limiter = limiter.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };

                progress.start_page();
                let outcome = fetch_and_parse(source.as_ref(), parser.as_ref(), page).await;
                progress.finish_page(outcome.is_ok());

                // The collector only goes away once every sender is dropped
                let _ = tx.send(PageResult { page, outcome }).await;
            }));
        }

        let watcher = tokio::spawn(async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!("Page task panicked: {}", e);
                }
            }
            let _ = stop_tx.send(true);
            drop(tx);
        });

        let mut assets: Vec<Asset> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut succeeded: BTreeSet<u64> = BTreeSet::new();

        while let Some(result) = rx.recv().await {
            match result.outcome {
                Ok(page_assets) => {
                    succeeded.insert(result.page);
                    for asset in page_assets {
                        merge_asset(&mut assets, &mut positions, asset);
                    }
                }
                Err(e) => {
                    tracing::warn!("Dropping page {} from corpus: {}", result.page, e);
                }
            }
        }

        if let Err(e) = watcher.await {
            tracing::error!("Completion watcher failed: {}", e);
        }
        if let Err(e) = observer.await {
            tracing::error!("Progress observer failed: {}", e);
        }

        let failed_pages: Vec<u64> = (1..=pages).filter(|p| !succeeded.contains(p)).collect();

        tracing::info!(
            "Crawl finished: {} assets from {}/{} pages in {:?}",
            assets.len(),
            succeeded.len(),
            pages,
            start_time.elapsed()
        );
        if !failed_pages.is_empty() {
            tracing::warn!("{} pages missing from corpus: {:?}", failed_pages.len(), failed_pages);
        }

        Ok(CrawlOutcome {
            assets,
            page_count: pages,
            failed_pages,
        })
    }
}

async fn fetch_and_parse(
    source: &dyn ListingSource,
    parser: &dyn PageParser,
    page: u64,
) -> Result<Vec<Asset>, CrawlError> {
    let listing = source
        .fetch_page(page)
        .await
        .map_err(|e| CrawlError::PageFetch { page, source: e })?;

    let mut assets = parser
        .parse(&listing.content)
        .map_err(|e| CrawlError::PageParse { page, source: e })?;

    let inv_popularity = i64::try_from(page).unwrap_or(i64::MAX);
    for asset in &mut assets {
        asset.inv_popularity = inv_popularity;
    }
    Ok(assets)
}

/// Adds `asset` to the corpus, keeping one entry per game id
///
/// When the listing shifts mid-crawl an asset can show up on two pages; the
/// copy from the earlier page wins.
fn merge_asset(assets: &mut Vec<Asset>, positions: &mut HashMap<String, usize>, asset: Asset) {
    match positions.get(&asset.game_id) {
        Some(&index) => {
            if asset.inv_popularity < assets[index].inv_popularity {
                assets[index] = asset;
            }
        }
        None => {
            positions.insert(asset.game_id.clone(), assets.len());
            assets.push(asset);
        }
    }
}
