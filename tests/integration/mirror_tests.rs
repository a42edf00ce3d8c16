use std::sync::Arc;
use thread_mirror::crawler::{share_store, CrawlSettings, Orchestrator, SharedStore};
use thread_mirror::source::{ForumSource, HttpSource};
use thread_mirror::storage::{SqliteStorage, ThreadStore};
use thread_mirror::SourceError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX_HTML: &str = r#"<html><body><div id="content">
    <p><a href="archiver/fid-4.html">Games</a></p>
</div></body></html>"#;

const LISTING_HTML: &str = r#"<html><body><div id="content"><ul type="1">
    <li><a href="archiver/tid-100.html">Long thread</a> (47 replies)</li>
    <li><a href="archiver/tid-101.html">Short thread</a> (5 replies)</li>
</ul></div></body></html>"#;

const EMPTY_LISTING_HTML: &str = r#"<html><body><div id="content"><ul type="1"></ul></div></body></html>"#;

/// Renders a thread page holding posts `start..start + count`
fn posts_html(start: usize, count: usize) -> String {
    let mut html = String::from("<html><body><div id=\"content\">");
    for i in start..start + count {
        html.push_str(&format!(
            "<p class=\"author\"><strong>user{}</strong> posted 2024-03-{:02} 10:{:02}</p>\npost number {}\n",
            i % 5,
            1 + i / 60,
            i % 60,
            i
        ));
    }
    html.push_str("<div class=\"page\">pages</div></div></body></html>");
    html
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page_path: &str, page: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .and(query_param("page", page))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts a forum with two listed threads of 48 and 6 posts
async fn mount_forum(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/2b/archiver/"))
        .respond_with(html(INDEX_HTML))
        .mount(server)
        .await;

    mount_page(server, "/2b/archiver/fid-4.html", "1", html(LISTING_HTML)).await;
    mount_page(server, "/2b/archiver/fid-4.html", "2", html(EMPTY_LISTING_HTML)).await;
    mount_page(server, "/2b/archiver/tid-101.html", "1", html(posts_html(0, 6))).await;
}

fn settings() -> CrawlSettings {
    CrawlSettings {
        forum_listing_depth: 2,
        per_pass_page_cap: 3,
        max_snapshots: 500,
        max_concurrent_forums: 4,
        forum_ids: Vec::new(),
    }
}

fn orchestrator(server: &MockServer, store: SharedStore) -> Orchestrator {
    let source = HttpSource::new(&format!("{}/2b/", server.uri())).expect("valid base url");
    Orchestrator::new(Arc::new(source), store, settings())
}

fn temp_store() -> (tempfile::TempDir, SharedStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = SqliteStorage::new(&dir.path().join("mirror.db")).expect("open store");
    (dir, share_store(storage))
}

#[tokio::test]
async fn test_full_pass_mirrors_listed_threads() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    mount_page(&server, "/2b/archiver/tid-100.html", "1", html(posts_html(0, 30))).await;
    mount_page(&server, "/2b/archiver/tid-100.html", "2", html(posts_html(30, 30))).await;

    let (_dir, store) = temp_store();
    let report = orchestrator(&server, store.clone()).run_pass().await.unwrap();

    assert_eq!(report.forums_total, 1);
    assert_eq!(report.forums_failed, 0);
    assert_eq!(report.threads_seen, 2);
    assert_eq!(report.threads_created, 2);
    assert_eq!(report.posts_appended, 48 + 6);

    let store = store.lock().unwrap();
    let long = store.get(100).unwrap().expect("thread 100 stored");
    assert_eq!(long.forum_id, 4);
    assert_eq!(long.title, "Long thread");
    assert_eq!(long.posts.len(), 48);
    assert_eq!(long.posts[47].body, "post number 47");
    assert_eq!(long.snapshots.len(), 1);
    assert_eq!(long.snapshots[0].total_known_items, 48);
    assert_eq!(long.snapshots[0].listing_rank, 0);

    let short = store.get(101).unwrap().expect("thread 101 stored");
    assert_eq!(short.posts.len(), 6);
    assert_eq!(short.posts[0].author, "user0");
    assert_eq!(short.snapshots[0].listing_rank, 1);
}

#[tokio::test]
async fn test_second_pass_fetches_nothing_new() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    mount_page(&server, "/2b/archiver/tid-100.html", "1", html(posts_html(0, 30))).await;
    mount_page(&server, "/2b/archiver/tid-100.html", "2", html(posts_html(30, 30))).await;

    let (_dir, store) = temp_store();
    let orchestrator = orchestrator(&server, store.clone());

    orchestrator.run_pass().await.unwrap();
    let first_requests = server.received_requests().await.unwrap().len();

    let second = orchestrator.run_pass().await.unwrap();

    assert_eq!(second.posts_appended, 0);
    assert_eq!(second.requests.post_page, 0);
    // Only the forum index and two listing pages are requested again
    let all_requests = server.received_requests().await.unwrap().len();
    assert_eq!(all_requests - first_requests, 3);

    let store = store.lock().unwrap();
    let long = store.get(100).unwrap().unwrap();
    assert_eq!(long.posts.len(), 48);
    assert_eq!(long.snapshots.len(), 2);
    assert_eq!(store.recent_passes(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_failing_post_page_keeps_snapshot() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    mount_page(&server, "/2b/archiver/tid-100.html", "1", html(posts_html(0, 30))).await;
    mount_page(
        &server,
        "/2b/archiver/tid-100.html",
        "2",
        ResponseTemplate::new(403),
    )
    .await;

    let (_dir, store) = temp_store();
    let report = orchestrator(&server, store.clone()).run_pass().await.unwrap();

    assert_eq!(report.forums_failed, 0);
    assert_eq!(report.post_fetch_failures, 1);

    let store = store.lock().unwrap();
    let long = store.get(100).unwrap().unwrap();
    assert_eq!(long.posts.len(), 30);
    assert_eq!(long.snapshots.len(), 1);
    // The forum task carried on with the next thread
    assert_eq!(store.get(101).unwrap().unwrap().posts.len(), 6);
}

#[tokio::test]
async fn test_listing_failure_skips_forum() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2b/archiver/"))
        .respond_with(html(INDEX_HTML))
        .mount(&server)
        .await;
    mount_page(&server, "/2b/archiver/fid-4.html", "1", html(LISTING_HTML)).await;
    mount_page(
        &server,
        "/2b/archiver/fid-4.html",
        "2",
        ResponseTemplate::new(500),
    )
    .await;

    let (_dir, store) = temp_store();
    let report = orchestrator(&server, store.clone()).run_pass().await.unwrap();

    assert_eq!(report.forums_failed, 1);
    assert_eq!(report.threads_seen, 0);
    assert!(store.lock().unwrap().get(100).unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_thread_reads_as_absent() {
    let (_dir, store) = temp_store();
    assert_eq!(store.lock().unwrap().get(31337).unwrap(), None);
}

#[tokio::test]
async fn test_login_requires_auth_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2b/member.php"))
        .and(query_param("mod", "logging"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "B7Y9_2132_auth=token; path=/"),
        )
        .mount(&server)
        .await;

    let source = HttpSource::new(&format!("{}/2b/", server.uri())).unwrap();
    assert!(source.login("reader", "secret").await.is_ok());

    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2b/member.php"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "other=1; path=/"))
        .mount(&rejecting)
        .await;

    let source = HttpSource::new(&format!("{}/2b/", rejecting.uri())).unwrap();
    assert!(matches!(
        source.login("reader", "wrong").await,
        Err(SourceError::LoginFailed(_))
    ));
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let server = MockServer::start().await;
    mount_forum(&server).await;
    mount_page(&server, "/2b/archiver/tid-100.html", "1", html(posts_html(0, 30))).await;
    mount_page(&server, "/2b/archiver/tid-100.html", "2", html(posts_html(30, 30))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mirror.db");
    let store = Arc::new(std::sync::Mutex::new(SqliteStorage::new(&db_path).unwrap()));

    {
        let source = HttpSource::new(&format!("{}/2b/", server.uri())).unwrap();
        let orchestrator = Orchestrator::new(Arc::new(source), store.clone(), settings());
        orchestrator.run_pass().await.unwrap();
    }

    let storage = Arc::try_unwrap(store)
        .ok()
        .expect("store no longer shared")
        .into_inner()
        .unwrap();
    storage.close().unwrap();

    let reopened = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(reopened.get(100).unwrap().unwrap().posts.len(), 48);
    assert_eq!(reopened.stats(500).unwrap().threads, 2);
}
