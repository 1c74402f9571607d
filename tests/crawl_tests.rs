//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the remote listing and drive the
//! full crawl and harvest cycle end-to-end.

mod common;

use assetgrep::crawler::{
    CrawlError, CrawlOrchestrator, FetchError, Harvester, HtmlAssetParser, ListingSource,
    SourceClient,
};
use assetgrep::search::SearchCache;
use assetgrep::storage::{DurableStore, SqliteStore};
use common::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_client(server: &MockServer) -> SourceClient {
    SourceClient::new(&source_config(&server.uri()), &user_agent()).unwrap()
}

fn orchestrator(server: &MockServer) -> CrawlOrchestrator {
    CrawlOrchestrator::new(
        Arc::new(source_client(server)),
        Arc::new(HtmlAssetParser::new()),
        crawler_config(),
    )
}

#[tokio::test]
async fn test_crawl_drops_page_that_exhausts_retries() {
    let server = MockServer::start().await;
    mount_listing(&server, 237, 50, &[3]).await;

    let outcome = orchestrator(&server).run().await.unwrap();

    assert_eq!(outcome.page_count, 5);
    assert_eq!(outcome.failed_pages, vec![3]);
    assert_eq!(outcome.assets.len(), 50 + 50 + 50 + 37);

    let ids: HashSet<&str> = outcome.assets.iter().map(|a| a.game_id.as_str()).collect();
    assert_eq!(ids.len(), outcome.assets.len(), "no duplicates");
    assert!(outcome.assets.iter().all(|a| !a.game_id.starts_with("p3-")));

    for asset in &outcome.assets {
        let page: i64 = asset.game_id[1..asset.game_id.find('-').unwrap()].parse().unwrap();
        assert_eq!(asset.inv_popularity, page);
    }
}

#[tokio::test]
async fn test_crawl_extracts_asset_fields() {
    let server = MockServer::start().await;
    mount_listing(&server, 2, 2, &[]).await;

    let outcome = orchestrator(&server).run().await.unwrap();
    let asset = outcome
        .assets
        .iter()
        .find(|a| a.game_id == "p1-1")
        .unwrap();

    assert_eq!(asset.title, "Forest Pack 1");
    assert_eq!(asset.author, "someone");
    assert_eq!(asset.description, "Tiles and sprites");
    assert_eq!(asset.link, "https://example.itch.io/p1-1");
    assert_eq!(asset.thumb_url, "https://img.itch.zone/p1-1.png");
    assert_eq!(asset.inv_popularity, 1);
}

#[tokio::test]
async fn test_malformed_page_is_dropped() {
    let server = MockServer::start().await;
    mount_summary(&server, "(6 results)").await;
    mount_page(&server, 1, ResponseTemplate::new(200).set_body_json(page_body(1, 2, 2))).await;
    mount_page(&server, 2, ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;
    mount_page(&server, 3, ResponseTemplate::new(200).set_body_json(page_body(3, 2, 2))).await;

    let outcome = orchestrator(&server).run().await.unwrap();

    assert_eq!(outcome.failed_pages, vec![2]);
    assert_eq!(outcome.assets.len(), 4);
}

#[tokio::test]
async fn test_count_probe_failure_fails_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(SummaryRequest)
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = orchestrator(&server).run().await;
    assert!(matches!(
        result,
        Err(CrawlError::CountProbe(FetchError::UnexpectedStatus { status: 500, .. }))
    ));
}

#[tokio::test]
async fn test_count_without_number_fails_crawl() {
    let server = MockServer::start().await;
    mount_summary(&server, "no results").await;

    let result = orchestrator(&server).run().await;
    assert!(matches!(
        result,
        Err(CrawlError::CountProbe(FetchError::MissingCount { .. }))
    ));
}

#[tokio::test]
async fn test_first_page_failure_fails_crawl() {
    let server = MockServer::start().await;
    mount_summary(&server, "(100 results)").await;
    mount_page(&server, 1, ResponseTemplate::new(404)).await;

    let result = orchestrator(&server).run().await;
    assert!(matches!(result, Err(CrawlError::FirstPage(_))));
}

#[tokio::test]
async fn test_count_probe_waits_out_rate_limiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(SummaryRequest)
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_summary(&server, "(53,665 results)").await;

    let client = source_client(&server);
    assert_eq!(client.fetch_count().await.unwrap(), 53_665);
}

#[tokio::test]
async fn test_page_fetch_retries_rate_limiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, 4, ResponseTemplate::new(200).set_body_json(page_body(4, 10, 3))).await;

    let client = source_client(&server);
    let page = client.fetch_page(4).await.unwrap();
    assert_eq!(page.items_per_page, 10);
    assert_eq!(page.page, 4);
}

#[tokio::test]
async fn test_page_fetch_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = source_client(&server);
    assert!(matches!(
        client.fetch_page(1).await,
        Err(FetchError::Exhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn test_page_fetch_does_not_retry_hard_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = source_client(&server);
    assert!(matches!(
        client.fetch_page(1).await,
        Err(FetchError::UnexpectedStatus { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_harvest_then_query() {
    let server = MockServer::start().await;
    mount_listing(&server, 120, 50, &[]).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let store: Arc<dyn DurableStore> =
        Arc::new(SqliteStore::new(&PathBuf::from(&config.storage.database_path)).unwrap());

    let harvester = Harvester::from_config(&config, store.clone()).unwrap();
    let report = harvester.harvest().await.unwrap();
    assert_eq!(report.assets, 120);
    assert!(report.failed_pages.is_empty());
    assert_eq!(store.get_corpus().unwrap().len(), 120);
    assert!(store.corpus_update_time().unwrap().is_some());

    let cache = SearchCache::new(
        store,
        config.cache.clone(),
        PathBuf::from(&config.storage.scratch_dir),
    );

    let first = cache.query("desert", 0).await.unwrap();
    assert_eq!(first.len(), 36);
    assert!(first.iter().all(|a| a.inv_popularity == 2));
    let second = cache.query("desert", 1).await.unwrap();
    assert_eq!(second.len(), 14);
    assert!(cache.query("desert", 2).await.is_err());
}
