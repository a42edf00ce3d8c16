//! Crawler module: the incremental crawl engine
//!
//! This module contains the core mirroring logic, including:
//! - Page planning for partially mirrored threads
//! - Per-thread read-modify-write merges
//! - Pass orchestration across forums

mod merge;
mod orchestrator;
mod planner;

pub use merge::{MergeOutcome, ThreadMerger};
pub use orchestrator::{ForumOutcome, Orchestrator, PassReport};
pub use planner::{plan_pages, trim_page};

use crate::config::Config;
use crate::storage::{StorageError, ThreadStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Thread store shared by all forum tasks of a pass
pub type SharedStore = Arc<Mutex<dyn ThreadStore + Send>>;

/// Wraps a store so it can be shared across forum tasks
pub fn share_store<S: ThreadStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Locks the shared store for a single call
///
/// Callers must drop the guard before the next `.await`.
pub(crate) fn lock_store(
    store: &SharedStore,
) -> Result<MutexGuard<'_, dyn ThreadStore + Send + 'static>, StorageError> {
    store.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Crawl budgets, resolved from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Listing pages walked per forum
    pub forum_listing_depth: usize,
    /// Leading post pages considered per thread
    pub per_pass_page_cap: usize,
    /// Snapshot count at which a thread is frozen
    pub max_snapshots: usize,
    /// Forum tasks allowed to run at once
    pub max_concurrent_forums: usize,
    /// Forums to crawl; empty means all
    pub forum_ids: Vec<u64>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            forum_listing_depth: 3,
            per_pass_page_cap: 3,
            max_snapshots: 500,
            max_concurrent_forums: 8,
            forum_ids: Vec::new(),
        }
    }
}

impl From<&Config> for CrawlSettings {
    fn from(config: &Config) -> Self {
        Self {
            forum_listing_depth: config.crawler.forum_listing_depth as usize,
            per_pass_page_cap: config.crawler.per_pass_page_cap as usize,
            max_snapshots: config.crawler.max_snapshots as usize,
            max_concurrent_forums: config.crawler.max_concurrent_forums as usize,
            forum_ids: config.source.forum_ids.clone(),
        }
    }
}

/// Source calls issued during one pass
#[derive(Debug, Default)]
pub struct RequestCounters {
    forum_index: AtomicU64,
    thread_listing: AtomicU64,
    post_page: AtomicU64,
}

impl RequestCounters {
    pub(crate) fn add_forum_index(&self) {
        self.forum_index.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_thread_listing(&self) {
        self.thread_listing.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_post_page(&self) {
        self.post_page.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the current totals
    pub fn totals(&self) -> RequestTotals {
        RequestTotals {
            forum_index: self.forum_index.load(Ordering::Relaxed),
            thread_listing: self.thread_listing.load(Ordering::Relaxed),
            post_page: self.post_page.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RequestCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestTotals {
    pub forum_index: u64,
    pub thread_listing: u64,
    pub post_page: u64,
}
