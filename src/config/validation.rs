use crate::config::types::{Config, CrawlerConfig, SourceConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on simultaneous forum tasks
const MAX_CONCURRENT_FORUMS_LIMIT: u32 = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_source_config(&config.source)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates crawl budgets and scheduling
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.interval_seconds < 1 {
        return Err(ConfigError::Validation(
            "interval-seconds must be >= 1".to_string(),
        ));
    }

    for (name, value) in [
        ("forum-listing-depth", config.forum_listing_depth),
        ("per-pass-page-cap", config.per_pass_page_cap),
        ("max-snapshots", config.max_snapshots),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.max_concurrent_forums < 1 || config.max_concurrent_forums > MAX_CONCURRENT_FORUMS_LIMIT
    {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-forums must be between 1 and {}, got {}",
            MAX_CONCURRENT_FORUMS_LIMIT, config.max_concurrent_forums
        )));
    }

    Ok(())
}

/// Validates the remote source section
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    // Relative page paths are joined onto the base, which drops the last
    // segment unless the path ends with a slash.
    if !url.path().ends_with('/') {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must end with '/'",
            config.base_url
        )));
    }

    if config.username.as_deref().is_some_and(|u| !u.is_empty()) && config.password.is_none() {
        return Err(ConfigError::Validation(
            "password is required when username is set".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
