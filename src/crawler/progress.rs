//! Crawl progress counters
//!
//! Process-local and observability only; nothing reads these for correctness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Shared counters updated by every page task
#[derive(Debug, Default)]
pub struct CrawlProgress {
    total: AtomicU64,
    fetched: AtomicU64,
    in_flight: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`CrawlProgress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: u64,
    /// Pages whose task has finished, successfully or not
    pub fetched: u64,
    pub in_flight: u64,
    pub failed: u64,
}

impl CrawlProgress {
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            ..Self::default()
        }
    }

    pub fn start_page(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish_page(&self, succeeded: bool) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.fetched.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Logs progress every `interval` until `stop` flips to true
pub async fn observe(progress: Arc<CrawlProgress>, interval: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snap = progress.snapshot();
                tracing::info!(
                    "Pages fetched: {}/{}, in progress: {}, failed: {}",
                    snap.fetched,
                    snap.total,
                    snap.in_flight,
                    snap.failed
                );
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}
