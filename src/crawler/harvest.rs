//! Harvest pipeline: crawl, build the index, persist both
//!
//! The prebuilt index archive is stored before the corpus, so a bumped corpus
//! timestamp is never observed ahead of its matching archive.

use crate::config::Config;
use crate::crawler::{CrawlError, CrawlOrchestrator, FetchError, HtmlAssetParser, SourceClient};
use crate::model::{Asset, IndexedAsset};
use crate::search::SearchIndex;
use crate::storage::DurableStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const STAGING_DIR: &str = "index-staging";

/// Summary of a finished harvest
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub assets: usize,
    pub pages: u64,
    pub failed_pages: Vec<u64>,

    /// False when the crawl produced nothing and the stored corpus was kept
    pub persisted: bool,
}

/// Clears the running flag when the harvest ends, however it ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs crawls and persists their results, one at a time
pub struct Harvester {
    orchestrator: CrawlOrchestrator,
    store: Arc<dyn DurableStore>,
    scratch_dir: PathBuf,
    archive_name: String,
    running: Arc<AtomicBool>,
}

impl Harvester {
    pub fn new(
        orchestrator: CrawlOrchestrator,
        store: Arc<dyn DurableStore>,
        scratch_dir: PathBuf,
        archive_name: String,
    ) -> Self {
        Self {
            orchestrator,
            store,
            scratch_dir,
            archive_name,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wires the HTTP listing client and HTML parser described by `config`
    pub fn from_config(config: &Config, store: Arc<dyn DurableStore>) -> Result<Self, FetchError> {
        let source = SourceClient::new(&config.source, &config.user_agent)?;
        let orchestrator = CrawlOrchestrator::new(
            Arc::new(source),
            Arc::new(HtmlAssetParser::new()),
            config.crawler.clone(),
        );

        Ok(Self::new(
            orchestrator,
            store,
            PathBuf::from(&config.storage.scratch_dir),
            config.cache.index_archive_name.clone(),
        ))
    }

    /// Whether a harvest is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_begin(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(Arc::clone(&self.running)))
    }

    /// Runs one crawl and persists it
    ///
    /// Fails with [`CrawlError::AlreadyRunning`] if another harvest is active.
    pub async fn harvest(&self) -> Result<HarvestReport, CrawlError> {
        let _guard = self.try_begin().ok_or(CrawlError::AlreadyRunning)?;
        self.run_once().await
    }

    /// Starts a harvest in the background
    ///
    /// Returns false, without starting anything, if one is already running.
    pub fn trigger(self: &Arc<Self>) -> bool {
        let Some(guard) = self.try_begin() else {
            tracing::info!("Harvest already in progress, ignoring trigger");
            return false;
        };

        let harvester = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            match harvester.run_once().await {
                Ok(report) => tracing::info!(
                    "Harvest finished: {} assets, {} failed pages",
                    report.assets,
                    report.failed_pages.len()
                ),
                Err(e) => tracing::error!("Harvest failed: {}", e),
            }
        });
        true
    }

    async fn run_once(&self) -> Result<HarvestReport, CrawlError> {
        let started = Instant::now();
        let outcome = self.orchestrator.run().await?;

        let mut report = HarvestReport {
            assets: outcome.assets.len(),
            pages: outcome.page_count,
            failed_pages: outcome.failed_pages,
            persisted: false,
        };

        if outcome.assets.is_empty() && report.pages > 0 {
            tracing::error!(
                "All {} pages failed, keeping the stored corpus",
                report.pages
            );
            return Ok(report);
        }

        self.persist(outcome.assets).await?;
        report.persisted = true;

        tracing::info!(
            "Stored {} assets and index archive '{}' in {:?}",
            report.assets,
            self.archive_name,
            started.elapsed()
        );
        Ok(report)
    }

    async fn persist(&self, assets: Vec<Asset>) -> Result<(), CrawlError> {
        let store = Arc::clone(&self.store);
        let staging = self.scratch_dir.join(STAGING_DIR);
        let archive_name = self.archive_name.clone();

        tokio::task::spawn_blocking(move || {
            let result = stage_and_store(store.as_ref(), &assets, &staging, &archive_name);
            if staging.exists() {
                if let Err(e) = fs::remove_dir_all(&staging) {
                    tracing::warn!("Could not remove {}: {}", staging.display(), e);
                }
            }
            result
        })
        .await?
    }
}

fn stage_and_store(
    store: &dyn DurableStore,
    assets: &[Asset],
    staging: &Path,
    archive_name: &str,
) -> Result<(), CrawlError> {
    if staging.exists() {
        fs::remove_dir_all(staging).map_err(crate::storage::StorageError::from)?;
    }

    let docs: Vec<IndexedAsset> = assets.iter().map(IndexedAsset::from).collect();
    let index = SearchIndex::build_in_dir(staging, &docs)?;
    tracing::debug!(
        "Staged index of {} assets at {}",
        index.len(),
        staging.display()
    );
    drop(index);

    store.put_archive(staging, archive_name)?;
    store.put_corpus(assets)?;
    Ok(())
}
