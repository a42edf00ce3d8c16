//! Thread-Mirror: an incremental forum mirror
//!
//! This crate re-visits a discussion forum on a schedule and copies each
//! thread into a local SQLite store, fetching only the posts that were not
//! captured by earlier passes.

pub mod config;
pub mod crawler;
pub mod source;
pub mod storage;

use thiserror::Error;

/// Main error type for Thread-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a remote forum source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Login rejected for user {0}")]
    LoginFailed(String),

    #[error("Invalid source URL: {0}")]
    Url(#[from] ::url::ParseError),
}

/// Result type alias for Thread-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for remote source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Orchestrator, PassReport, ThreadMerger};
pub use source::{Forum, ForumSource, HttpSource, Post, ThreadRef};
pub use storage::{PersistedThread, Snapshot, SqliteStorage, ThreadStore};
