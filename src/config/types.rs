use serde::Deserialize;

/// Main configuration structure for Thread-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
}

/// Crawl scheduling and budget configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seconds between the start of consecutive passes
    #[serde(rename = "interval-seconds", default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Number of listing pages walked per forum and pass
    #[serde(rename = "forum-listing-depth", default = "default_forum_listing_depth")]
    pub forum_listing_depth: u32,

    /// Maximum post pages fetched for a single thread in one pass
    #[serde(rename = "per-pass-page-cap", default = "default_per_pass_page_cap")]
    pub per_pass_page_cap: u32,

    /// Snapshot count at which a thread is frozen
    #[serde(rename = "max-snapshots", default = "default_max_snapshots")]
    pub max_snapshots: u32,

    /// Maximum number of forums crawled at the same time
    #[serde(rename = "max-concurrent-forums", default = "default_max_concurrent_forums")]
    pub max_concurrent_forums: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            forum_listing_depth: default_forum_listing_depth(),
            per_pass_page_cap: default_per_pass_page_cap(),
            max_snapshots: default_max_snapshots(),
            max_concurrent_forums: default_max_concurrent_forums(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    3600
}

fn default_forum_listing_depth() -> u32 {
    3
}

fn default_per_pass_page_cap() -> u32 {
    3
}

fn default_max_snapshots() -> u32 {
    500
}

fn default_max_concurrent_forums() -> u32 {
    8
}

/// Remote forum configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Root of the forum, e.g. "https://bbs.saraba1st.com/2b/"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Forums to mirror; empty means every forum the source lists
    #[serde(rename = "forum-ids", default)]
    pub forum_ids: Vec<u64>,

    /// Optional login name
    #[serde(default)]
    pub username: Option<String>,

    /// Password for `username`
    #[serde(default)]
    pub password: Option<String>,
}

impl SourceConfig {
    /// Returns the credentials if both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
