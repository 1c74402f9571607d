use crate::config::types::{
    CacheConfig, Config, CrawlerConfig, ServerConfig, SourceConfig, StorageConfig, UserAgentConfig,
};
use crate::crawler::{Backoff, MAX_BACKOFF_SECS};
use crate::{ConfigError, ConfigResult};
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_source_config(&config.source)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_crawler_config(&config.crawler)?;
    validate_cache_config(&config.cache)?;
    validate_storage_config(&config.storage)?;
    validate_server_config(&config.server)?;
    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> ConfigResult<()> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if !config.listing_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "listing_path must start with '/', got '{}'",
            config.listing_path
        )));
    }

    if scraper::Selector::parse(&config.count_selector).is_err() {
        return Err(ConfigError::Validation(format!(
            "count_selector must be a valid CSS selector, got '{}'",
            config.count_selector
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if !(config.growth_factor > 1.0) {
        return Err(ConfigError::Validation(format!(
            "growth_factor must be > 1.0, got {}",
            config.growth_factor
        )));
    }

    if config.base_delay_ms < 1 {
        return Err(ConfigError::Validation(
            "base_delay_ms must be >= 1".to_string(),
        ));
    }

    // The last retry of a page is attempt index max_attempts - 2
    if config.max_attempts >= 2 {
        let backoff = Backoff::new(
            Duration::from_millis(config.base_delay_ms),
            config.growth_factor,
        );
        let last_retry = backoff.nominal_secs(config.max_attempts - 2);
        if last_retry > MAX_BACKOFF_SECS {
            return Err(ConfigError::Validation(format!(
                "base_delay_ms * growth_factor^(max_attempts - 2) must stay within {}s, got {:.0}s",
                MAX_BACKOFF_SECS, last_retry
            )));
        }
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if !(config.spread_divisor > 0.0) || !config.spread_divisor.is_finite() {
        return Err(ConfigError::Validation(format!(
            "spread_divisor must be a positive number, got {}",
            config.spread_divisor
        )));
    }

    if config.progress_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "progress_interval_secs must be >= 1, got {}",
            config.progress_interval_secs
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> ConfigResult<()> {
    if config.page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page_size must be >= 1, got {}",
            config.page_size
        )));
    }

    if !(config.lifetime_hours > 0.0) {
        return Err(ConfigError::Validation(format!(
            "lifetime_hours must be > 0, got {}",
            config.lifetime_hours
        )));
    }

    if config.index_archive_name.is_empty() || config.index_archive_name.contains('/') {
        return Err(ConfigError::Validation(format!(
            "index_archive_name must be a plain non-empty name, got '{}'",
            config.index_archive_name
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.scratch_dir.is_empty() {
        return Err(ConfigError::Validation(
            "scratch_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> ConfigResult<()> {
    config.bind.parse::<SocketAddr>().map_err(|_| {
        ConfigError::Validation(format!(
            "bind must be a socket address such as 0.0.0.0:8080, got '{}'",
            config.bind
        ))
    })?;
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> ConfigResult<()> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceConfig {
        SourceConfig {
            base_url: "https://itch.io".to_string(),
            listing_path: "/game-assets".to_string(),
            count_selector: ".game_count".to_string(),
            max_attempts: 11,
            base_delay_ms: 1000,
            growth_factor: 1.95,
            rate_limit_delay_ms: 4000,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn test_validate_source() {
        assert!(validate_source_config(&source()).is_ok());

        let mut bad = source();
        bad.base_url = "ftp://itch.io".to_string();
        assert!(validate_source_config(&bad).is_err());

        let mut bad = source();
        bad.growth_factor = 1.0;
        assert!(validate_source_config(&bad).is_err());

        let mut bad = source();
        bad.max_attempts = 0;
        assert!(validate_source_config(&bad).is_err());

        let mut bad = source();
        bad.listing_path = "game-assets".to_string();
        assert!(validate_source_config(&bad).is_err());

        let mut bad = source();
        bad.count_selector = "[[".to_string();
        assert!(validate_source_config(&bad).is_err());

        let mut bad = source();
        bad.base_delay_ms = 0;
        assert!(validate_source_config(&bad).is_err());
    }

    #[test]
    fn test_validate_source_rejects_backoff_past_cap() {
        // 10s * 1.95^9 is over an hour
        let mut slow = source();
        slow.base_delay_ms = 10_000;
        assert!(validate_source_config(&slow).is_err());

        // 10s * 1.95^5 is under five minutes
        slow.max_attempts = 7;
        assert!(validate_source_config(&slow).is_ok());

        let mut single = source();
        single.base_delay_ms = 10_000_000;
        single.max_attempts = 1;
        assert!(validate_source_config(&single).is_ok());
    }

    #[test]
    fn test_validate_crawler() {
        assert!(validate_crawler_config(&CrawlerConfig::default()).is_ok());

        let bad = CrawlerConfig {
            spread_divisor: 0.0,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&bad).is_err());

        let bad = CrawlerConfig {
            spread_divisor: f64::NAN,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&bad).is_err());
    }

    #[test]
    fn test_validate_cache() {
        assert!(validate_cache_config(&CacheConfig::default()).is_ok());

        let bad = CacheConfig {
            page_size: 0,
            ..CacheConfig::default()
        };
        assert!(validate_cache_config(&bad).is_err());

        let bad = CacheConfig {
            index_archive_name: "../escape".to_string(),
            ..CacheConfig::default()
        };
        assert!(validate_cache_config(&bad).is_err());
    }

    #[test]
    fn test_validate_server() {
        assert!(validate_server_config(&ServerConfig::default()).is_ok());
        let bad = ServerConfig {
            bind: "localhost".to_string(),
        };
        assert!(validate_server_config(&bad).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
