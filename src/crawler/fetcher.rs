//! HTTP fetcher implementation
//!
//! This module handles all requests to the remote listing:
//! - Building the HTTP client with a proper user agent string
//! - The count summary probe
//! - Paginated listing fetches with full-jitter exponential backoff

use crate::config::{SourceConfig, UserAgentConfig};
use crate::crawler::parser::extract_item_count;
use crate::crawler::FetchError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Upper bound on a single backoff wait
///
/// Configuration validation keeps the last retry of a page below it.
pub const MAX_BACKOFF_SECS: f64 = 900.0;

/// One page of the remote listing
#[derive(Debug, Clone, Deserialize)]
pub struct ListingPage {
    /// Number of items the listing serves per page
    #[serde(rename = "num_items")]
    pub items_per_page: u64,

    /// Page number echoed back by the listing
    pub page: u64,

    /// Raw page content, handed to a [`PageParser`](crate::crawler::PageParser)
    pub content: String,
}

/// The remote listing as seen by the crawl orchestrator
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Returns the total number of items in the listing
    async fn fetch_count(&self) -> Result<u64, FetchError>;

    /// Fetches one listing page (1-based)
    async fn fetch_page(&self, page: u64) -> Result<ListingPage, FetchError>;
}

/// Full-jitter exponential backoff
///
/// The wait before retry `attempt` is `base * growth^attempt * U(0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    growth: f64,
}

impl Backoff {
    pub fn new(base: Duration, growth: f64) -> Self {
        Self { base, growth }
    }

    /// `base * growth^attempt` in seconds, before the cap
    pub fn nominal_secs(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        self.base.as_secs_f64() * self.growth.powi(exponent)
    }

    /// The largest delay `delay` can return for this attempt
    pub fn ceiling(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.nominal_secs(attempt).min(MAX_BACKOFF_SECS))
    }

    /// Draws the wait before retry `attempt`
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.ceiling(attempt).mul_f64(rng.gen::<f64>())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Per-request timeout
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`ListingSource`]
pub struct SourceClient {
    client: Client,
    listing_url: Url,
    count_selector: String,
    max_attempts: u32,
    backoff: Backoff,
    rate_limit_delay: Duration,
}

impl SourceClient {
    /// Creates a client for the listing described by `source`
    pub fn new(source: &SourceConfig, user_agent: &UserAgentConfig) -> Result<Self, FetchError> {
        let client = build_http_client(user_agent, Duration::from_secs(source.request_timeout_secs))
            .map_err(|e| FetchError::Network {
                url: source.base_url.clone(),
                source: e,
            })?;
        Self::with_client(client, source)
    }

    /// Creates a client reusing an existing `reqwest::Client`
    pub fn with_client(client: Client, source: &SourceConfig) -> Result<Self, FetchError> {
        let listing_url = Url::parse(&source.base_url)?.join(&source.listing_path)?;
        Ok(Self {
            client,
            listing_url,
            count_selector: source.count_selector.clone(),
            max_attempts: source.max_attempts.max(1),
            backoff: Backoff::new(
                Duration::from_millis(source.base_delay_ms),
                source.growth_factor,
            ),
            rate_limit_delay: Duration::from_millis(source.rate_limit_delay_ms),
        })
    }

    /// URL of the JSON listing for one page
    pub fn page_url(&self, page: u64) -> Url {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("format", "json");
        url
    }

    async fn attempt_page(&self, url: &Url) -> Result<ListingPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ListingSource for SourceClient {
    /// Fetches the count summary and normalizes its human formatted total
    ///
    /// Rate limiting is waited out with a fixed delay for as long as it lasts;
    /// network errors and other statuses fail immediately.
    async fn fetch_count(&self) -> Result<u64, FetchError> {
        let url = self.listing_url.to_string();
        loop {
            let response = self
                .client
                .get(self.listing_url.clone())
                .send()
                .await
                .map_err(|e| FetchError::Network {
                    url: url.clone(),
                    source: e,
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(
                    "Count probe rate limited, retrying in {:?}",
                    self.rate_limit_delay
                );
                tokio::time::sleep(self.rate_limit_delay).await;
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::UnexpectedStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            let body = response.text().await.map_err(|e| FetchError::Malformed {
                url: url.clone(),
                message: e.to_string(),
            })?;
            return extract_item_count(&body, &self.count_selector);
        }
    }

    /// Fetches one listing page, retrying network failures and rate limiting
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Network error | Retry with backoff |
    /// | HTTP 429 | Retry with backoff |
    /// | Other non-2xx | Immediate failure |
    /// | Undecodable body | Immediate failure |
    async fn fetch_page(&self, page: u64) -> Result<ListingPage, FetchError> {
        let url = self.page_url(page);

        for attempt in 0..self.max_attempts {
            match self.attempt_page(&url).await {
                Ok(listing) => return Ok(listing),
                Err(e) if e.is_transient() => {
                    tracing::warn!("Page {} attempt {} failed: {}", page, attempt + 1, e);
                }
                Err(e) => {
                    tracing::error!("Page {} failed: {}", page, e);
                    return Err(e);
                }
            }

            if attempt + 1 < self.max_attempts {
                let delay = self.backoff.delay(attempt, &mut rand::thread_rng());
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(
            "Page {} failed after {} attempts",
            page,
            self.max_attempts
        );
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
        })
    }
}
