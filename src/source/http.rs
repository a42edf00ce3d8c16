//! HTTP implementation of [`ForumSource`]
//!
//! This module handles all requests to the remote forum:
//! - Building a cookie-keeping HTTP client
//! - Form login
//! - Fetching archiver pages and handing them to the parsers

use crate::source::parser::{parse_forum_index, parse_post_page, parse_thread_listing};
use crate::source::{Forum, ForumSource, Post, ThreadRef};
use crate::{SourceError, SourceResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Cookie set by the site once a login succeeds
const AUTH_COOKIE: &str = "B7Y9_2132_auth";

const LOGIN_PATH: &str =
    "member.php?mod=logging&action=login&loginsubmit=yes&infloat=yes&lssubmit=yes&inajax=1";
const FORUM_INDEX_PATH: &str = "archiver/";

/// Builds an HTTP client that keeps the session cookie between requests
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Scrapes the forum's archiver pages
pub struct HttpSource {
    client: Client,
    base_url: Url,
}

impl HttpSource {
    /// Creates a source rooted at `base_url` (which must end with `/`)
    pub fn new(base_url: &str) -> SourceResult<Self> {
        let base_url = Url::parse(base_url)?;
        let client = build_http_client().map_err(|source| SourceError::Http {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a source with a caller-supplied client
    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn page_url(&self, path: &str) -> SourceResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// GETs `url` and returns the body of a 2xx response
    async fn fetch_page(&self, url: &Url) -> SourceResult<String> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| SourceError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| SourceError::Http {
            url: url.to_string(),
            source,
        })
    }
}

fn parse_error(url: &Url, message: String) -> SourceError {
    SourceError::Parse {
        url: url.to_string(),
        message,
    }
}

#[async_trait]
impl ForumSource for HttpSource {
    async fn login(&self, username: &str, password: &str) -> SourceResult<()> {
        let url = self.page_url(LOGIN_PATH)?;
        let form = [
            ("username", username),
            ("password", password),
            ("fastloginfield", "username"),
            ("quickforward", "yes"),
            ("handlekey", "ls"),
        ];

        let response = self
            .client
            .post(url.clone())
            .form(&form[..])
            .send()
            .await
            .map_err(|source| SourceError::Http {
                url: url.to_string(),
                source,
            })?;

        if response.cookies().any(|cookie| cookie.name() == AUTH_COOKIE) {
            tracing::info!("Logged in as {}", username);
            Ok(())
        } else {
            Err(SourceError::LoginFailed(username.to_string()))
        }
    }

    async fn list_forums(&self) -> SourceResult<Vec<Forum>> {
        let url = self.page_url(FORUM_INDEX_PATH)?;
        let body = self.fetch_page(&url).await?;
        parse_forum_index(&body).map_err(|message| parse_error(&url, message))
    }

    async fn list_threads(&self, forum: &Forum, page: usize) -> SourceResult<Vec<ThreadRef>> {
        // The archiver numbers pages from 1
        let url = self.page_url(&format!("archiver/fid-{}.html?page={}", forum.id, page + 1))?;
        let body = self.fetch_page(&url).await?;
        parse_thread_listing(&body, forum.id).map_err(|message| parse_error(&url, message))
    }

    async fn list_posts(&self, thread: &ThreadRef, page: usize) -> SourceResult<Vec<Post>> {
        let url = self.page_url(&format!("archiver/tid-{}.html?page={}", thread.id, page + 1))?;
        let body = self.fetch_page(&url).await?;
        parse_post_page(&body).map_err(|message| parse_error(&url, message))
    }
}
