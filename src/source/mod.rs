//! Remote forum sources
//!
//! The crawl engine only talks to the forum through [`ForumSource`]. The
//! production implementation, [`HttpSource`], scrapes the forum's archiver
//! pages; tests plug in an in-memory source instead.

mod http;
mod parser;

#[cfg(test)]
pub(crate) mod fake;

pub use http::{build_http_client, HttpSource};
pub use parser::{parse_forum_index, parse_post_page, parse_thread_listing};

use crate::storage::StoredPost;
use crate::SourceResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Number of posts on one remote thread page
///
/// Fixed by the forum software; every page except the last is full.
pub const POSTS_PER_PAGE: usize = 30;

/// A forum (board) on the remote site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forum {
    pub id: u64,
    pub title: String,
}

/// A thread as it appears in a forum listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: u64,
    pub title: String,
    pub forum_id: u64,
    /// Posts the remote reports for the thread, opening post included
    pub total_known_items: u32,
    /// Position in the forum listing
    ///
    /// Sources fill in the position within the fetched page; the crawler
    /// renumbers threads across all listing pages it walks.
    pub listing_rank: u32,
}

/// A single post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub author: String,
    pub posted_at: DateTime<Utc>,
    pub body: String,
}

impl From<Post> for StoredPost {
    fn from(post: Post) -> Self {
        StoredPost {
            author: post.author,
            posted_at: post.posted_at,
            body: post.body,
        }
    }
}

/// The remote side of the mirror
///
/// Page numbers are 0-based; implementations translate them to whatever the
/// site uses.
#[async_trait]
pub trait ForumSource: Send + Sync {
    /// Establishes a session that later calls reuse
    async fn login(&self, username: &str, password: &str) -> SourceResult<()>;

    /// Lists every forum visible to the session
    async fn list_forums(&self) -> SourceResult<Vec<Forum>>;

    /// Lists one page of threads of `forum`, in listing order
    async fn list_threads(&self, forum: &Forum, page: usize) -> SourceResult<Vec<ThreadRef>>;

    /// Lists one page of posts of `thread`, in thread order
    async fn list_posts(&self, thread: &ThreadRef, page: usize) -> SourceResult<Vec<Post>>;
}
