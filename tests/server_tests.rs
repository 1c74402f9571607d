//! Integration tests for the HTTP surface
//!
//! A real server is bound to an ephemeral port and driven with reqwest; the
//! remote listing behind `/trigger-fetch` is a wiremock server.

mod common;

use assetgrep::crawler::Harvester;
use assetgrep::model::Asset;
use assetgrep::search::SearchCache;
use assetgrep::storage::{DurableStore, SqliteStore};
use assetgrep::web::{self, AppState};
use common::*;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

struct TestServer {
    base: String,
    state: Arc<AppState>,
    store: Arc<dyn DurableStore>,
    _listing: MockServer,
    _dir: TempDir,
}

fn seed_asset(id: &str, title: &str, page: i64) -> Asset {
    Asset {
        game_id: id.to_string(),
        title: title.to_string(),
        author: "seed".to_string(),
        description: String::new(),
        link: format!("https://example.itch.io/{}", id),
        thumb_url: format!("https://img.itch.zone/{}.png", id),
        inv_popularity: page,
    }
}

/// Starts a server over a store seeded with `seed`, listing `listing_total` remote items
async fn start_server(seed: &[Asset], listing_total: u64) -> TestServer {
    let listing = MockServer::start().await;
    mount_listing(&listing, listing_total, 10, &[]).await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&listing.uri(), dir.path());
    config.cache.page_size = 2;

    let store: Arc<dyn DurableStore> =
        Arc::new(SqliteStore::new(&PathBuf::from(&config.storage.database_path)).unwrap());
    store.put_corpus(seed).unwrap();

    let cache = Arc::new(SearchCache::new(
        store.clone(),
        config.cache.clone(),
        PathBuf::from(&config.storage.scratch_dir),
    ));
    cache.refresh().await.unwrap();

    let harvester = Arc::new(Harvester::from_config(&config, store.clone()).unwrap());
    let state = Arc::new(AppState { cache, harvester });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(web::serve(listener, state.clone()));

    TestServer {
        base,
        state,
        store,
        _listing: listing,
        _dir: dir,
    }
}

fn ids(body: &str) -> Vec<String> {
    let assets: Vec<Asset> = serde_json::from_str(body).unwrap();
    assets.into_iter().map(|a| a.game_id).collect()
}

fn seed() -> Vec<Asset> {
    vec![
        seed_asset("a", "Forest Tiles", 1),
        seed_asset("b", "Desert Tiles", 1),
        seed_asset("c", "Forrest Props", 2),
        seed_asset("d", "Castle Walls", 2),
        seed_asset("e", "Forest Creatures", 3),
    ]
}

#[tokio::test]
async fn test_browse_pages() {
    let server = start_server(&seed(), 0).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("{}/assets/0", server.base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ids(&response.text().await.unwrap()), vec!["a", "b"]);

    let response = client.get(format!("{}/assets/2", server.base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ids(&response.text().await.unwrap()), vec!["e"]);

    for bad in ["3", "-1", "abc"] {
        let response = client
            .get(format!("{}/assets/{}", server.base, bad))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "page {}", bad);
    }
}

#[tokio::test]
async fn test_query_ranks_and_paginates() {
    let server = start_server(&seed(), 0).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/query/0", server.base))
        .form(&[("query", "forest")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Exact matches first by popularity, then the one-edit "Forrest"
    assert_eq!(ids(&response.text().await.unwrap()), vec!["a", "e"]);

    let response = client
        .post(format!("{}/query/1", server.base))
        .form(&[("query", "forest")])
        .send()
        .await
        .unwrap();
    assert_eq!(ids(&response.text().await.unwrap()), vec!["c"]);
}

#[tokio::test]
async fn test_query_rejects_bad_input() {
    let server = start_server(&seed(), 0).await;
    let client = reqwest::Client::new();

    let empty = client
        .post(format!("{}/query/0", server.base))
        .form(&[("query", "")])
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let missing = client
        .post(format!("{}/query/0", server.base))
        .form(&[("other", "forest")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let bad_page = client
        .post(format!("{}/query/first", server.base))
        .form(&[("query", "forest")])
        .send()
        .await
        .unwrap();
    assert_eq!(bad_page.status(), StatusCode::BAD_REQUEST);

    let out_of_range = client
        .post(format!("{}/query/5", server.base))
        .form(&[("query", "forest")])
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trigger_fetch_only_accepts_get() {
    let server = start_server(&seed(), 0).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/trigger-fetch", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_trigger_fetch_harvests_and_query_sees_new_corpus() {
    let server = start_server(&seed(), 25).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/trigger-fetch", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Asset fetch and store initiated");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while server.state.harvester.is_running() {
        assert!(tokio::time::Instant::now() < deadline, "harvest did not finish");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.store.get_corpus().unwrap().len(), 25);

    // The store is newer than the snapshot, so the query refreshes first
    let response = client
        .post(format!("{}/query/0", server.base))
        .form(&[("query", "castle")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let hits: Vec<Asset> = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|a| a.inv_popularity == 3));
}

#[tokio::test]
async fn test_health_reports_stats() {
    let server = start_server(&seed(), 0).await;

    let response = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats: serde_json::Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(stats["assets"], 5);
    assert!(stats["refreshed_at"].is_string());
}
