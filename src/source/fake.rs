//! In-memory forum used by unit tests

use crate::source::{Forum, ForumSource, Post, ThreadRef, POSTS_PER_PAGE};
use crate::{SourceError, SourceResult};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Scriptable forum; every thread page is full unless a post count is set
#[derive(Default)]
pub struct FakeSource {
    pub forums: Vec<Forum>,
    pub listings: HashMap<(u64, usize), Vec<ThreadRef>>,
    pub available_posts: HashMap<u64, usize>,
    pub fail_forum_index: bool,
    pub failing_listings: HashSet<(u64, usize)>,
    pub failing_post_pages: HashSet<(u64, usize)>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forum(mut self, id: u64, pages: Vec<Vec<ThreadRef>>) -> Self {
        self.forums.push(Forum {
            id,
            title: format!("Forum {}", id),
        });
        for (page, threads) in pages.into_iter().enumerate() {
            self.listings.insert((id, page), threads);
        }
        self
    }

    pub fn post_page_calls(&self) -> Vec<(u64, usize)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| {
                let rest = call.strip_prefix("posts:")?;
                let (thread, page) = rest.split_once(':')?;
                Some((thread.parse().ok()?, page.parse().ok()?))
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn thread_ref(id: u64, forum_id: u64, total_known_items: u32) -> ThreadRef {
    ThreadRef {
        id,
        title: format!("Thread {}", id),
        forum_id,
        total_known_items,
        listing_rank: 0,
    }
}

/// The post the fake forum holds at absolute `index`
pub fn fake_post(thread_id: u64, index: usize) -> Post {
    Post {
        author: format!("user{}", index % 7),
        posted_at: Utc.timestamp_opt(1_700_000_000 + index as i64 * 60, 0).unwrap(),
        body: format!("thread {} post {}", thread_id, index),
    }
}

fn failure(what: String) -> SourceError {
    SourceError::Status {
        url: what,
        status: 503,
    }
}

#[async_trait]
impl ForumSource for FakeSource {
    async fn login(&self, username: &str, password: &str) -> SourceResult<()> {
        self.log(format!("login:{}", username));
        if password == "correct" {
            Ok(())
        } else {
            Err(SourceError::LoginFailed(username.to_string()))
        }
    }

    async fn list_forums(&self) -> SourceResult<Vec<Forum>> {
        self.log("forums".to_string());
        if self.fail_forum_index {
            return Err(failure("forums".to_string()));
        }
        Ok(self.forums.clone())
    }

    async fn list_threads(&self, forum: &Forum, page: usize) -> SourceResult<Vec<ThreadRef>> {
        self.log(format!("threads:{}:{}", forum.id, page));
        if self.failing_listings.contains(&(forum.id, page)) {
            return Err(failure(format!("threads:{}:{}", forum.id, page)));
        }
        Ok(self
            .listings
            .get(&(forum.id, page))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_posts(&self, thread: &ThreadRef, page: usize) -> SourceResult<Vec<Post>> {
        self.log(format!("posts:{}:{}", thread.id, page));
        if self.failing_post_pages.contains(&(thread.id, page)) {
            return Err(failure(format!("posts:{}:{}", thread.id, page)));
        }

        let start = page * POSTS_PER_PAGE;
        let end = match self.available_posts.get(&thread.id) {
            Some(&available) => available.min(start + POSTS_PER_PAGE),
            None => start + POSTS_PER_PAGE,
        };
        Ok((start..end.max(start))
            .map(|index| fake_post(thread.id, index))
            .collect())
    }
}
