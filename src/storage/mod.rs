//! Storage module for persisting mirrored threads
//!
//! This module owns the durable side of the mirror:
//! - SQLite database initialization and schema management
//! - One serialized [`PersistedThread`] per thread id
//! - A ledger of completed crawl passes

mod schema;
mod sqlite;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use sqlite::SqliteStorage;
pub use traits::{StorageError, StorageResult, ThreadStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opens (or creates) the thread store at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Everything the mirror knows about one remote thread
///
/// `posts` only ever grows, and its length is the thread's high-water mark:
/// the next pass resumes fetching at index `posts.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedThread {
    pub thread_id: u64,
    pub forum_id: u64,
    pub title: String,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub posts: Vec<StoredPost>,
}

impl PersistedThread {
    /// Creates an empty record for a thread seen for the first time
    pub fn new(thread_id: u64, forum_id: u64, title: impl Into<String>) -> Self {
        Self {
            thread_id,
            forum_id,
            title: title.into(),
            snapshots: Vec::new(),
            posts: Vec::new(),
        }
    }

    /// Number of posts already captured
    pub fn high_water_mark(&self) -> usize {
        self.posts.len()
    }

    /// Returns true once the snapshot history has reached `max_snapshots`
    pub fn is_frozen(&self, max_snapshots: usize) -> bool {
        self.snapshots.len() >= max_snapshots
    }

    /// Returns true for the zero-valued record, which stands for "nothing stored"
    pub fn is_placeholder(&self) -> bool {
        self.thread_id == 0
    }
}

/// Listing position and remote size of a thread at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub listing_rank: u32,
    pub total_known_items: u32,
    pub fetched_at: DateTime<Utc>,
}

/// A post as kept in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPost {
    pub author: String,
    pub posted_at: DateTime<Utc>,
    pub body: String,
}

/// One row of the pass ledger
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub forums_total: u32,
    pub forums_failed: u32,
    pub threads_seen: u64,
    pub posts_appended: u64,
}

/// Aggregate numbers shown by `--stats`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub threads: u64,
    pub posts: u64,
    pub frozen_threads: u64,
}
