//! HTML parsers for the forum's archiver pages
//!
//! The archiver is a stripped-down, script-free rendering of the forum:
//! - the index lists forums as plain links under `#content`
//! - a forum page lists threads as `<li>` items followed by a reply count
//! - a thread page interleaves `.author` headers with raw post text

use crate::source::{Forum, Post, ThreadRef};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// The site renders all timestamps in China Standard Time
const SITE_UTC_OFFSET_SECS: i32 = 8 * 3600;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static POST_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+-\d+-\d+ \d+:\d+").unwrap());
static EDGE_TABS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\t+|\t+$").unwrap());
static EDGE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\r\n]+|[\r\n]+$").unwrap());

/// Extracts the forum list from the archiver index page
pub fn parse_forum_index(html: &str) -> Result<Vec<Forum>, String> {
    let document = Html::parse_document(html);
    let link_selector = selector("#content a")?;

    let mut forums = Vec::new();
    for link in document.select(&link_selector) {
        let href = link
            .value()
            .attr("href")
            .ok_or_else(|| "forum link without href".to_string())?;
        let id = first_integer(href).ok_or_else(|| format!("no forum id in '{}'", href))?;

        forums.push(Forum {
            id,
            title: element_text(&link),
        });
    }

    Ok(forums)
}

/// Extracts one page of threads from a forum listing
///
/// The site counts replies, not posts, so the opening post is added back to
/// `total_known_items`.
pub fn parse_thread_listing(html: &str, forum_id: u64) -> Result<Vec<ThreadRef>, String> {
    let document = Html::parse_document(html);
    let item_selector = selector("ul[type] li")?;
    let link_selector = selector("a")?;

    let mut threads = Vec::new();
    for (rank, item) in document.select(&item_selector).enumerate() {
        let link = item
            .select(&link_selector)
            .next()
            .ok_or_else(|| "thread item without link".to_string())?;
        let href = link
            .value()
            .attr("href")
            .ok_or_else(|| "thread link without href".to_string())?;
        let id = first_integer(href).ok_or_else(|| format!("no thread id in '{}'", href))?;

        let trailing = item
            .last_child()
            .and_then(|node| node.value().as_text().map(|text| String::from(&**text)))
            .unwrap_or_default();
        let replies = first_integer(&trailing)
            .ok_or_else(|| format!("no reply count for thread {}", id))?;

        threads.push(ThreadRef {
            id,
            title: element_text(&link),
            forum_id,
            total_known_items: u32::try_from(replies.saturating_add(1)).unwrap_or(u32::MAX),
            listing_rank: rank as u32,
        });
    }

    Ok(threads)
}

/// Extracts the posts of one thread page, in page order
pub fn parse_post_page(html: &str) -> Result<Vec<Post>, String> {
    let document = Html::parse_document(html);
    let author_selector = selector(".author")?;
    let name_selector = selector("strong")?;

    let mut posts = Vec::new();
    for header in document.select(&author_selector) {
        let author = header
            .select(&name_selector)
            .next()
            .map(|name| element_text(&name))
            .ok_or_else(|| "post header without author".to_string())?;

        let header_text = header.text().collect::<String>();
        let posted_at = POST_TIME
            .find(&header_text)
            .ok_or_else(|| format!("no post time in '{}'", header_text.trim()))
            .and_then(|m| parse_site_time(m.as_str()))?;

        posts.push(Post {
            author,
            posted_at,
            body: post_body(&header),
        });
    }

    Ok(posts)
}

/// Collects the text between a post header and the next header or pager
fn post_body(header: &ElementRef<'_>) -> String {
    let mut body = String::new();

    for sibling in header.next_siblings() {
        let node = sibling.value();
        if let Some(element) = node.as_element() {
            if element.classes().any(|c| c == "author" || c == "page") {
                break;
            }
        } else if let Some(text) = node.as_text() {
            body.push_str(&**text);
        }
    }

    let body = EDGE_TABS.replace_all(&body, "");
    EDGE_NEWLINES.replace_all(&body, "").into_owned()
}

fn parse_site_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map_err(|e| format!("bad post time '{}': {}", raw, e))?;
    let offset = FixedOffset::east_opt(SITE_UTC_OFFSET_SECS)
        .ok_or_else(|| "invalid site offset".to_string())?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("ambiguous post time '{}'", raw))
}

fn first_integer(s: &str) -> Option<u64> {
    INTEGER.find(s).and_then(|m| m.as_str().parse().ok())
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("bad selector '{}': {:?}", css, e))
}
