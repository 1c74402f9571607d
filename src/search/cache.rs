use crate::config::{CacheConfig, IndexSource};
use crate::model::{Asset, IndexedAsset};
use crate::search::index::SearchIndex;
use crate::search::tokenizer::tokenize_query;
use crate::search::{CacheError, IndexError};
use crate::storage::{DurableStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// An immutable corpus + index pair, published atomically
#[derive(Debug, Default)]
pub struct Snapshot {
    assets: Vec<Asset>,
    by_id: HashMap<String, usize>,
    index: Option<SearchIndex>,
    refreshed_at: Option<DateTime<Utc>>,
    source_updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn new(
        assets: Vec<Asset>,
        index: SearchIndex,
        source_updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        let by_id = assets
            .iter()
            .enumerate()
            .map(|(position, asset)| (asset.game_id.clone(), position))
            .collect();

        Self {
            assets,
            by_id,
            index: Some(index),
            refreshed_at: Some(Utc::now()),
            source_updated_at,
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset(&self, game_id: &str) -> Option<&Asset> {
        self.by_id.get(game_id).map(|&position| &self.assets[position])
    }

    pub fn index(&self) -> Option<&SearchIndex> {
        self.index.as_ref()
    }

    /// Documents in the published index
    pub fn indexed_docs(&self) -> usize {
        self.index.as_ref().map_or(0, SearchIndex::len)
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn source_updated_at(&self) -> Option<DateTime<Utc>> {
        self.source_updated_at
    }

    /// True until the first successful refresh
    pub fn is_empty_state(&self) -> bool {
        self.refreshed_at.is_none()
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub assets: usize,
    pub indexed_docs: usize,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub source_updated_at: Option<DateTime<Utc>>,
}

/// The Search Cache Engine
///
/// Readers clone the published `Arc<Snapshot>` under a short read lock.
/// A refresh prepares the replacement without holding the lock and takes the
/// write lock only to swap the pointer, so the old snapshot stays queryable
/// for the whole rebuild. Refreshes are serialized by a separate gate.
pub struct SearchCache {
    store: Arc<dyn DurableStore>,
    config: CacheConfig,
    scratch_dir: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
    refresh_gate: Mutex<()>,
}

impl SearchCache {
    /// Creates a cache holding an empty, never refreshed snapshot
    pub fn new(store: Arc<dyn DurableStore>, config: CacheConfig, scratch_dir: PathBuf) -> Self {
        Self {
            store,
            config,
            scratch_dir,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            refresh_gate: Mutex::new(()),
        }
    }

    /// The currently published snapshot
    pub async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    /// Whether the published snapshot should be refreshed
    ///
    /// Never refreshed means stale. Otherwise the store's corpus timestamp
    /// decides; if it cannot be read, the local lifetime does.
    pub async fn is_stale(&self) -> bool {
        let snapshot = self.current().await;
        let Some(refreshed_at) = snapshot.refreshed_at else {
            return true;
        };

        let store = Arc::clone(&self.store);
        let observed = tokio::task::spawn_blocking(move || store.corpus_update_time()).await;

        match observed {
            Ok(Ok(Some(updated))) => match snapshot.source_updated_at {
                Some(seen) => updated > seen,
                None => true,
            },
            Ok(Ok(None)) => self.lifetime_expired(refreshed_at),
            Ok(Err(e)) => {
                tracing::warn!("Cannot read corpus update time, using local lifetime: {}", e);
                self.lifetime_expired(refreshed_at)
            }
            Err(e) => {
                tracing::warn!("Update time check failed, using local lifetime: {}", e);
                self.lifetime_expired(refreshed_at)
            }
        }
    }

    fn lifetime_expired(&self, refreshed_at: DateTime<Utc>) -> bool {
        let lifetime = Duration::milliseconds((self.config.lifetime_hours * 3_600_000.0) as i64);
        Utc::now() - refreshed_at >= lifetime
    }

    /// Rebuilds the snapshot from the durable store unconditionally
    ///
    /// On failure the previously published snapshot is kept unchanged.
    pub async fn refresh(&self) -> Result<(), CacheError> {
        let _gate = self.refresh_gate.lock().await;
        self.rebuild().await
    }

    /// Refreshes only if stale, returning whether a refresh happened
    ///
    /// A caller that waited on another refresh re-checks staleness first.
    pub async fn refresh_if_stale(&self) -> Result<bool, CacheError> {
        if !self.is_stale().await {
            return Ok(false);
        }

        let _gate = self.refresh_gate.lock().await;
        if !self.is_stale().await {
            return Ok(false);
        }

        self.rebuild().await?;
        Ok(true)
    }

    async fn rebuild(&self) -> Result<(), CacheError> {
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let scratch_dir = self.scratch_dir.clone();

        let started = std::time::Instant::now();
        let prepared =
            tokio::task::spawn_blocking(move || prepare_snapshot(store.as_ref(), &config, &scratch_dir))
                .await
                .map_err(|e| CacheError::RefreshTask(e.to_string()))?;

        let snapshot = match prepared {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Cache refresh failed, keeping previous snapshot: {}", e);
                return Err(e);
            }
        };

        tracing::info!(
            "Cache refreshed: {} assets, {} indexed in {:.2?}",
            snapshot.assets.len(),
            snapshot.indexed_docs(),
            started.elapsed()
        );

        let previous = {
            let mut published = self.snapshot.write().await;
            std::mem::replace(&mut *published, Arc::new(snapshot))
        };
        drop(previous);

        Ok(())
    }

    /// Returns page `page` (0-based) of the corpus in stored order
    ///
    /// Page 0 of an empty corpus is an empty page rather than `OutOfRange`.
    pub async fn page(&self, page: usize) -> Result<Vec<Asset>, CacheError> {
        let snapshot = self.current().await;
        paginate(&snapshot.assets, page, self.config.page_size)
    }

    /// Ranks the corpus against `text` and returns page `page` (0-based)
    ///
    /// Refreshes first when stale. If that refresh fails the query is served
    /// from the retained snapshot, unless nothing was ever published.
    pub async fn query(&self, text: &str, page: usize) -> Result<Vec<Asset>, CacheError> {
        if tokenize_query(text).is_empty() {
            return Err(CacheError::EmptyQuery);
        }

        if let Err(e) = self.refresh_if_stale().await {
            if self.current().await.is_empty_state() {
                return Err(e);
            }
            tracing::warn!("Serving query from previous snapshot: {}", e);
        }

        let snapshot = self.current().await;
        let hits = match snapshot.index() {
            Some(index) => index.search(text)?,
            None => Vec::new(),
        };
        let ranked: Vec<&Asset> = hits
            .iter()
            .filter_map(|hit| snapshot.asset(&hit.game_id))
            .collect();

        tracing::debug!("Query {:?} matched {} assets", text, ranked.len());

        let hits = paginate(&ranked, page, self.config.page_size)?;
        Ok(hits.into_iter().cloned().collect())
    }

    /// Statistics of the published snapshot
    pub async fn stats(&self) -> CacheStats {
        let snapshot = self.current().await;
        CacheStats {
            assets: snapshot.assets.len(),
            indexed_docs: snapshot.indexed_docs(),
            refreshed_at: snapshot.refreshed_at,
            source_updated_at: snapshot.source_updated_at,
        }
    }
}

/// Slices `items` into page `page` of `page_size`
///
/// Page 0 always exists, even for an empty sequence; any later page must start
/// inside it. The last page may be short.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Result<Vec<T>, CacheError> {
    let out_of_range = || CacheError::OutOfRange {
        page,
        total: items.len(),
    };

    let start = page.checked_mul(page_size).ok_or_else(out_of_range)?;
    if page > 0 && start >= items.len() {
        return Err(out_of_range());
    }

    let start = start.min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    Ok(items[start..end].to_vec())
}

/// Pulls the corpus and its index from the store, off the async runtime
fn prepare_snapshot(
    store: &dyn DurableStore,
    config: &CacheConfig,
    scratch_dir: &Path,
) -> Result<Snapshot, CacheError> {
    let source_updated_at = store.corpus_update_time()?;
    let assets = store.get_corpus()?;

    let index = match config.index_source {
        IndexSource::Rebuild => build_index(&assets)?,
        IndexSource::Archive => {
            match load_archived_index(store, &config.index_archive_name, scratch_dir) {
                Ok(index) if index.len() == assets.len() => index,
                Ok(index) => {
                    tracing::warn!(
                        "Archived index covers {} assets but the corpus has {}, rebuilding",
                        index.len(),
                        assets.len()
                    );
                    build_index(&assets)?
                }
                Err(e) => {
                    tracing::warn!("Archived index unavailable, rebuilding: {}", e);
                    build_index(&assets)?
                }
            }
        }
    };

    Ok(Snapshot::new(assets, index, source_updated_at))
}

fn build_index(assets: &[Asset]) -> Result<SearchIndex, IndexError> {
    let docs: Vec<IndexedAsset> = assets.iter().map(IndexedAsset::from).collect();
    SearchIndex::build(&docs)
}

fn load_archived_index(
    store: &dyn DurableStore,
    name: &str,
    scratch_dir: &Path,
) -> Result<SearchIndex, CacheError> {
    let dest = scratch_dir.join("index-load");
    if dest.exists() {
        fs::remove_dir_all(&dest).map_err(StorageError::from)?;
    }

    let root = store.get_archive(name, &dest)?;
    let loaded = SearchIndex::load_from_dir(&root);

    if let Err(e) = fs::remove_dir_all(&dest) {
        tracing::debug!("Could not remove {}: {}", dest.display(), e);
    }

    Ok(loaded?)
}
