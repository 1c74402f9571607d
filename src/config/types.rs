use serde::Deserialize;

/// Main configuration structure for Assetgrep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Remote listing and fetch retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Origin of the remote listing (e.g. "https://itch.io")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path serving both the count summary and, with `page`/`format=json`,
    /// the paginated listing
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,

    /// CSS selector of the element holding the human formatted item count
    #[serde(rename = "count-selector", default = "default_count_selector")]
    pub count_selector: String,

    /// Attempt ceiling for a single page fetch
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay of the exponential backoff (milliseconds)
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor of the exponential backoff
    #[serde(rename = "growth-factor", default = "default_growth_factor")]
    pub growth_factor: f64,

    /// Fixed wait when the count probe is rate limited (milliseconds)
    #[serde(rename = "rate-limit-delay-ms", default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Crawl fan-out configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Pre-fetch jitter is drawn from `[0, page_count / spread_divisor]` seconds
    #[serde(rename = "spread-divisor", default = "default_spread_divisor")]
    pub spread_divisor: f64,

    /// Interval between progress log lines (seconds)
    #[serde(rename = "progress-interval-secs", default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,

    /// Upper bound on simultaneous page fetches; 0 means unbounded
    #[serde(rename = "max-concurrent-fetches", default)]
    pub max_concurrent_fetches: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            spread_divisor: default_spread_divisor(),
            progress_interval_secs: default_progress_interval_secs(),
            max_concurrent_fetches: 0,
        }
    }
}

/// Where a refresh obtains its search index from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    /// Always rebuild the index from the freshly pulled corpus
    Rebuild,
    /// Load the prebuilt index archive, rebuilding locally if that fails
    Archive,
}

/// Search cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Assets per page for browsing and query results
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: usize,

    /// Local staleness lifetime used when the store timestamp is unavailable
    #[serde(rename = "lifetime-hours", default = "default_lifetime_hours")]
    pub lifetime_hours: f64,

    #[serde(rename = "index-source", default = "default_index_source")]
    pub index_source: IndexSource,

    /// Storage name of the prebuilt index archive
    #[serde(rename = "index-archive-name", default = "default_index_archive_name")]
    pub index_archive_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            lifetime_hours: default_lifetime_hours(),
            index_source: default_index_source(),
            index_archive_name: default_index_archive_name(),
        }
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Working directory for index staging and archive extraction
    #[serde(rename = "scratch-dir", default = "default_scratch_dir")]
    pub scratch_dir: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_listing_path() -> String {
    "/game-assets".to_string()
}

fn default_count_selector() -> String {
    ".game_count".to_string()
}

fn default_max_attempts() -> u32 {
    11
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_growth_factor() -> f64 {
    1.95
}

fn default_rate_limit_delay_ms() -> u64 {
    4000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_spread_divisor() -> f64 {
    18.0
}

fn default_progress_interval_secs() -> u64 {
    5
}

fn default_page_size() -> usize {
    36
}

fn default_lifetime_hours() -> f64 {
    24.0
}

fn default_index_source() -> IndexSource {
    IndexSource::Rebuild
}

fn default_index_archive_name() -> String {
    "index.tar.zst".to_string()
}

fn default_scratch_dir() -> String {
    "./scratch".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
