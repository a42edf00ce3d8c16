//! Pass orchestration
//!
//! One pass lists the forums, then crawls each forum in its own task:
//! - walk the first listing pages to collect thread refs
//! - merge every listed thread, one after another
//!
//! Forum tasks are isolated from each other. A task that fails is logged and
//! counted; it never stops its siblings or the pass.

use crate::crawler::merge::{MergeOutcome, ThreadMerger};
use crate::crawler::{lock_store, CrawlSettings, RequestCounters, RequestTotals, SharedStore};
use crate::source::{Forum, ForumSource, ThreadRef};
use crate::storage::PassRecord;
use crate::MirrorError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Result of crawling one forum during a pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumOutcome {
    pub forum_id: u64,
    pub threads_seen: u64,
    pub threads_created: u64,
    pub threads_frozen: u64,
    pub posts_appended: u64,
    pub post_fetch_failures: u64,
    /// Set when the forum task stopped early
    pub error: Option<String>,
}

impl ForumOutcome {
    fn new(forum_id: u64) -> Self {
        Self {
            forum_id,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: MergeOutcome) {
        self.threads_seen += 1;
        match outcome {
            MergeOutcome::Frozen => self.threads_frozen += 1,
            MergeOutcome::Merged {
                created,
                posts_appended,
                post_fetch_failed,
            } => {
                if created {
                    self.threads_created += 1;
                }
                self.posts_appended += posts_appended as u64;
                if post_fetch_failed {
                    self.post_fetch_failures += 1;
                }
            }
        }
    }
}

/// Summary of one complete pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub forums_total: u32,
    pub forums_failed: u32,
    pub threads_seen: u64,
    pub threads_created: u64,
    pub threads_frozen: u64,
    pub posts_appended: u64,
    pub post_fetch_failures: u64,
    pub requests: RequestTotals,
}

impl PassReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            forums_total: 0,
            forums_failed: 0,
            threads_seen: 0,
            threads_created: 0,
            threads_frozen: 0,
            posts_appended: 0,
            post_fetch_failures: 0,
            requests: RequestTotals::default(),
        }
    }

    fn absorb(&mut self, outcome: &ForumOutcome) {
        if outcome.error.is_some() {
            self.forums_failed += 1;
        }
        self.threads_seen += outcome.threads_seen;
        self.threads_created += outcome.threads_created;
        self.threads_frozen += outcome.threads_frozen;
        self.posts_appended += outcome.posts_appended;
        self.post_fetch_failures += outcome.post_fetch_failures;
    }

    /// The ledger row stored for this pass
    pub fn to_record(&self) -> PassRecord {
        PassRecord {
            started_at: self.started_at,
            finished_at: self.finished_at,
            forums_total: self.forums_total,
            forums_failed: self.forums_failed,
            threads_seen: self.threads_seen,
            posts_appended: self.posts_appended,
        }
    }
}

/// Drives crawl passes over every selected forum
pub struct Orchestrator {
    source: Arc<dyn ForumSource>,
    store: SharedStore,
    settings: CrawlSettings,
}

impl Orchestrator {
    /// Creates an orchestrator over `source` and `store`
    pub fn new(source: Arc<dyn ForumSource>, store: SharedStore, settings: CrawlSettings) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    /// The settings this orchestrator runs with
    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Logs in to the source
    pub async fn login(&self, username: &str, password: &str) -> Result<(), MirrorError> {
        Ok(self.source.login(username, password).await?)
    }

    /// Runs one complete pass
    ///
    /// Returns once every forum task has finished. Only a failure to list the
    /// forums fails the pass; per-forum failures are folded into the report.
    pub async fn run_pass(&self) -> Result<PassReport, MirrorError> {
        let mut report = PassReport::new(Utc::now());
        let counters = Arc::new(RequestCounters::default());

        counters.add_forum_index();
        let forums = self.select_forums(self.source.list_forums().await?);
        report.forums_total = forums.len() as u32;
        tracing::info!("Starting pass over {} forums", forums.len());

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_forums.max(1)));
        let mut tasks = JoinSet::new();

        for forum in forums {
            let task = ForumTask {
                source: Arc::clone(&self.source),
                merger: ThreadMerger::new(
                    Arc::clone(&self.source),
                    Arc::clone(&self.store),
                    &self.settings,
                )
                .with_counters(Arc::clone(&counters)),
                counters: Arc::clone(&counters),
                listing_depth: self.settings.forum_listing_depth,
            };
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                // Held until the forum task returns
                let _permit = semaphore.acquire_owned().await;
                task.run(forum).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.absorb(&outcome),
                Err(e) => {
                    tracing::error!("Forum task aborted: {}", e);
                    report.forums_failed += 1;
                }
            }
        }

        report.finished_at = Utc::now();
        report.requests = counters.totals();

        tracing::info!(
            "Pass finished in {}s: {} forums ({} failed), {} threads ({} new, {} frozen), {} posts appended, {} requests",
            (report.finished_at - report.started_at).num_seconds(),
            report.forums_total,
            report.forums_failed,
            report.threads_seen,
            report.threads_created,
            report.threads_frozen,
            report.posts_appended,
            report.requests.forum_index + report.requests.thread_listing + report.requests.post_page
        );

        let recorded =
            lock_store(&self.store).and_then(|mut store| store.record_pass(&report.to_record()));
        if let Err(e) = recorded {
            tracing::warn!("Failed to record pass: {}", e);
        }

        Ok(report)
    }

    /// Restricts `forums` to the configured ids, keeping source order
    fn select_forums(&self, forums: Vec<Forum>) -> Vec<Forum> {
        if self.settings.forum_ids.is_empty() {
            return forums;
        }

        let listed: HashSet<u64> = forums.iter().map(|f| f.id).collect();
        for id in &self.settings.forum_ids {
            if !listed.contains(id) {
                tracing::warn!("Configured forum {} is not listed by the source", id);
            }
        }

        forums
            .into_iter()
            .filter(|f| self.settings.forum_ids.contains(&f.id))
            .collect()
    }
}

/// Everything one forum task needs, owned so it can be spawned
struct ForumTask {
    source: Arc<dyn ForumSource>,
    merger: ThreadMerger,
    counters: Arc<RequestCounters>,
    listing_depth: usize,
}

impl ForumTask {
    async fn run(self, forum: Forum) -> ForumOutcome {
        tracing::info!("Start fetch forum {} ({})", forum.title, forum.id);
        let mut outcome = ForumOutcome::new(forum.id);

        if let Err(e) = self.crawl(&forum, &mut outcome).await {
            tracing::error!("Error while fetching forum {}: {}", forum.title, e);
            outcome.error = Some(e.to_string());
        }

        outcome
    }

    async fn crawl(&self, forum: &Forum, outcome: &mut ForumOutcome) -> Result<(), MirrorError> {
        let threads = self.list_threads(forum).await?;

        for thread in &threads {
            match self.merger.merge_thread(thread.listing_rank, thread).await {
                Ok(merged) => outcome.record(merged),
                Err(e) => {
                    tracing::error!(
                        "Error while merging thread {} ({}): {}",
                        thread.title,
                        thread.id,
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Collects the first `listing_depth` listing pages, in rank order
    ///
    /// Each thread's `listing_rank` is its position across all collected
    /// pages, not within its own page.
    async fn list_threads(&self, forum: &Forum) -> Result<Vec<ThreadRef>, MirrorError> {
        let mut threads: Vec<ThreadRef> = Vec::new();
        for page in 0..self.listing_depth {
            self.counters.add_thread_listing();
            for mut thread in self.source.list_threads(forum, page).await? {
                thread.listing_rank = threads.len() as u32;
                threads.push(thread);
            }
        }
        Ok(threads)
    }
}
