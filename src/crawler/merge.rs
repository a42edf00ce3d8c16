//! Per-thread merge: load, extend, store
//!
//! One merge performs at most one store read and one store write. The record
//! is only written after every remote call has finished, so a failed merge
//! leaves the previously stored record untouched.

use crate::crawler::planner::{plan_pages, trim_page};
use crate::crawler::{lock_store, CrawlSettings, RequestCounters, SharedStore};
use crate::source::{ForumSource, Post, ThreadRef};
use crate::storage::{PersistedThread, Snapshot, StoredPost};
use crate::MirrorError;
use chrono::Utc;
use std::sync::Arc;

/// What a merge did to a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The snapshot cap was already reached; nothing was fetched or written
    Frozen,

    /// A snapshot was appended and the record written back
    Merged {
        /// The thread had no stored record before this merge
        created: bool,
        /// Posts added to the record
        posts_appended: usize,
        /// A post page failed and later pages were not requested
        post_fetch_failed: bool,
    },
}

/// Merges freshly listed threads into the store
///
/// The read-modify-write is not atomic across the store: two merges of the
/// same thread id running concurrently can lose posts. The orchestrator only
/// ever merges a given thread from one sequential forum task.
pub struct ThreadMerger {
    source: Arc<dyn ForumSource>,
    store: SharedStore,
    per_pass_page_cap: usize,
    max_snapshots: usize,
    counters: Arc<RequestCounters>,
}

impl ThreadMerger {
    /// Creates a merger with its own request counters
    pub fn new(source: Arc<dyn ForumSource>, store: SharedStore, settings: &CrawlSettings) -> Self {
        Self {
            source,
            store,
            per_pass_page_cap: settings.per_pass_page_cap,
            max_snapshots: settings.max_snapshots,
            counters: Arc::new(RequestCounters::default()),
        }
    }

    /// Counts post page requests into `counters`
    pub fn with_counters(mut self, counters: Arc<RequestCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Brings the stored copy of `thread` up to date
    ///
    /// # Algorithm
    ///
    /// 1. Load the record, or start an empty one for an unknown thread
    /// 2. Stop if the record is frozen (snapshot cap reached)
    /// 3. Append a snapshot of the thread's listing rank and size
    /// 4. Fetch the planned post pages, stopping at the first failure
    /// 5. Append the new posts and write the record back
    ///
    /// Post page failures are tolerated (threads can become unreadable, e.g.
    /// through permission changes); store failures are returned.
    pub async fn merge_thread(
        &self,
        listing_rank: u32,
        thread: &ThreadRef,
    ) -> Result<MergeOutcome, MirrorError> {
        let existing = lock_store(&self.store)?.get(thread.id)?;

        let (mut record, created) = match existing {
            Some(record) if record.thread_id == thread.id => (record, false),
            Some(record) => {
                tracing::warn!(
                    "Stored record for thread {} carries id {}, starting over",
                    thread.id,
                    record.thread_id
                );
                (fresh_record(thread), true)
            }
            None => {
                tracing::debug!("New thread: {} ({})", thread.title, thread.id);
                (fresh_record(thread), true)
            }
        };

        if record.is_frozen(self.max_snapshots) {
            tracing::trace!("Thread {} is frozen", thread.id);
            return Ok(MergeOutcome::Frozen);
        }

        record.snapshots.push(Snapshot {
            listing_rank,
            total_known_items: thread.total_known_items,
            fetched_at: Utc::now(),
        });

        let (posts, post_fetch_failed) = self
            .fetch_new_posts(thread, record.high_water_mark())
            .await;
        let posts_appended = posts.len();
        record.posts.extend(posts.into_iter().map(StoredPost::from));

        lock_store(&self.store)?.put(&record)?;

        tracing::debug!(
            "Merged thread {}: +{} posts ({} total)",
            thread.id,
            posts_appended,
            record.posts.len()
        );

        Ok(MergeOutcome::Merged {
            created,
            posts_appended,
            post_fetch_failed,
        })
    }

    /// Fetches the posts past `fetched`, page by page
    ///
    /// Returns the posts gathered before the first failing page and whether
    /// such a failure happened.
    async fn fetch_new_posts(&self, thread: &ThreadRef, fetched: usize) -> (Vec<Post>, bool) {
        let total = thread.total_known_items as usize;
        let mut posts = Vec::new();

        for page in plan_pages(fetched, total, self.per_pass_page_cap) {
            self.counters.add_post_page();
            match self.source.list_posts(thread, page).await {
                Ok(page_posts) => posts.extend(trim_page(page, fetched, total, page_posts)),
                Err(e) => {
                    tracing::warn!(
                        "Fetching page {} of thread {} ({}) failed: {}",
                        page,
                        thread.title,
                        thread.id,
                        e
                    );
                    return (posts, true);
                }
            }
        }

        (posts, false)
    }
}

fn fresh_record(thread: &ThreadRef) -> PersistedThread {
    PersistedThread::new(thread.id, thread.forum_id, thread.title.clone())
}
