//! Shared fixtures: a wiremock listing and matching configuration

#![allow(dead_code)]

use assetgrep::config::{
    CacheConfig, Config, CrawlerConfig, ServerConfig, SourceConfig, StorageConfig,
    UserAgentConfig,
};
use serde_json::json;
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const LISTING_PATH: &str = "/game-assets";

/// Matches the count summary request, which carries no `page` parameter
pub struct SummaryRequest;

impl Match for SummaryRequest {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == "page")
    }
}

/// Theme word used in every title on `page`
pub fn theme(page: u64) -> &'static str {
    match page {
        1 => "Forest",
        2 => "Desert",
        3 => "Castle",
        4 => "Ocean",
        _ => "Space",
    }
}

pub fn game_id(page: u64, item: u64) -> String {
    format!("p{}-{}", page, item)
}

/// HTML grid of `count` asset cells for `page`
pub fn page_html(page: u64, count: u64) -> String {
    (0..count)
        .map(|item| {
            let id = game_id(page, item);
            format!(
                r#"<div class="game_cell" data-game_id="{id}">
                    <a class="thumb_link" href="https://example.itch.io/{id}"><img data-lazy_src="https://img.itch.zone/{id}.png"></a>
                    <div class="game_cell_data">
                        <a class="title">{theme} Pack {item}</a>
                        <div class="game_text">Tiles and sprites</div>
                        <div class="game_author"><a href="https://someone.itch.io">someone</a></div>
                    </div>
                </div>"#,
                id = id,
                theme = theme(page),
                item = item,
            )
        })
        .collect()
}

pub fn summary_html(count_text: &str) -> String {
    format!(
        r#"<html><body><h1>Game assets <span class="game_count">{}</span></h1></body></html>"#,
        count_text
    )
}

pub fn page_body(page: u64, per_page: u64, count: u64) -> serde_json::Value {
    json!({
        "num_items": per_page,
        "page": page,
        "content": page_html(page, count),
    })
}

pub async fn mount_summary(server: &MockServer, count_text: &str) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(SummaryRequest)
        .respond_with(ResponseTemplate::new(200).set_body_string(summary_html(count_text)))
        .mount(server)
        .await;
}

pub async fn mount_page(server: &MockServer, page: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts a listing of `total` items, `per_page` per page
///
/// Pages listed in `broken` answer with a permanent 429.
pub async fn mount_listing(server: &MockServer, total: u64, per_page: u64, broken: &[u64]) {
    mount_summary(server, &format!("({} results)", total)).await;

    let pages = total.div_ceil(per_page);
    for page in 1..=pages {
        let response = if broken.contains(&page) {
            ResponseTemplate::new(429)
        } else {
            let count = per_page.min(total - (page - 1) * per_page);
            ResponseTemplate::new(200).set_body_json(page_body(page, per_page, count))
        };
        mount_page(server, page, response).await;
    }
}

pub fn source_config(base_url: &str) -> SourceConfig {
    SourceConfig {
        base_url: base_url.to_string(),
        listing_path: LISTING_PATH.to_string(),
        count_selector: ".game_count".to_string(),
        max_attempts: 3,
        base_delay_ms: 1,
        growth_factor: 1.95,
        rate_limit_delay_ms: 10,
        request_timeout_secs: 5,
    }
}

pub fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

pub fn crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        spread_divisor: 1000.0,
        progress_interval_secs: 1,
        max_concurrent_fetches: 0,
    }
}

pub fn test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        source: source_config(base_url),
        user_agent: user_agent(),
        crawler: crawler_config(),
        cache: CacheConfig {
            page_size: 36,
            ..CacheConfig::default()
        },
        storage: StorageConfig {
            database_path: dir.join("assetgrep.db").display().to_string(),
            scratch_dir: dir.join("scratch").display().to_string(),
        },
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}
