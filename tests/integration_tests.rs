//! End-to-end crawl scenarios over an in-memory site.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::watch;

use profile_scout::config::CrawlOptions;
use profile_scout::crawler::{CrawlOutcome, Crawler};
use profile_scout::links::PageLink;
use profile_scout::page::{ContentKind, Page, ProfileClassifier, ScrapeOption};
use profile_scout::plan::CrawlPlan;
use profile_scout::visitor::{PageVisitor, VisitError};

const BASE: &str = "https://site.test/";

/// Serves canned HTML; unknown URLs fail as unresolvable.
struct StubVisitor {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
}

impl StubVisitor {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

#[async_trait]
impl PageVisitor for StubVisitor {
    async fn visit(&self, link: &PageLink) -> Result<Page, VisitError> {
        if self.failing.contains(&link.url) {
            return Err(VisitError::Unreachable);
        }
        match self.pages.get(&link.url) {
            Some(html) => Ok(Page {
                link: link.clone(),
                kind: ContentKind::Html,
                html: html.clone(),
            }),
            None => Err(VisitError::Unresolved),
        }
    }
}

/// Flags every URL with a `/user/` segment as a profile page.
struct UserPathClassifier;

impl ProfileClassifier for UserPathClassifier {
    fn predict(&self, page: &Page) -> bool {
        page.link.url.contains("/user/")
    }
}

fn options() -> CrawlOptions {
    CrawlOptions {
        crawl_sleep_secs: 0,
        bump_relevant: false,
        ..CrawlOptions::default()
    }
}

fn crawler(
    visitor: StubVisitor,
    plan: CrawlPlan,
    options: CrawlOptions,
    export_dir: &Path,
    shutdown: watch::Receiver<bool>,
) -> Crawler {
    Crawler::new(
        Arc::new(visitor),
        Arc::new(UserPathClassifier),
        plan,
        options,
        BASE.to_string(),
        export_dir.to_path_buf(),
        shutdown,
    )
}

fn profile_site() -> StubVisitor {
    StubVisitor::new()
        .page(
            BASE,
            r#"<html><body>
                <a href="/staff">Our staff</a>
                <a href="/news">News</a>
            </body></html>"#,
        )
        .page(
            "https://site.test/staff",
            r#"<html><body>
                <nav><a href="/">Home</a></nav>
                <ul>
                    <li><a href="/user/1">Alice</a></li>
                    <li><a href="/user/2">Bob</a></li>
                    <li><a href="/user/3">Carol</a></li>
                </ul>
            </body></html>"#,
        )
        .page("https://site.test/news", "<html><body>No links here</body></html>")
        .page("https://site.test/user/1", "<html><body>Alice's page</body></html>")
        .page("https://site.test/user/2", "<html><body>Bob's page</body></html>")
        .page("https://site.test/user/3", "<html><body>Carol's page</body></html>")
}

fn html_files(export_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(export_dir.join("html"))
        .expect("html dir exists")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn scrape_pages_exports_every_visited_page() {
    let dir = TempDir::new().expect("tempdir");
    let (_tx, rx) = watch::channel(false);
    let visitor = StubVisitor::new()
        .page(BASE, r#"<a href="/a">a</a><a href="/b">b</a>"#)
        .page("https://site.test/a", "<html>a</html>")
        .page("https://site.test/b", "<html>b</html>");

    let summary = crawler(
        visitor,
        CrawlPlan::scrape_pages(ScrapeOption::Html),
        options(),
        dir.path(),
        rx,
    )
    .run()
    .await;

    assert_eq!(summary.outcome, CrawlOutcome::Exhausted);
    assert_eq!(summary.visited, 3);
    assert_eq!(summary.scraped, 3);
    assert_eq!(html_files(dir.path()).len(), 3);

    let out_log = fs::read_to_string(dir.path().join("out.log")).expect("out.log");
    assert!(out_log.contains("0 https://site.test/"));
    assert!(out_log.contains("1 https://site.test/a"));
    assert!(out_log.contains("is complete"));
}

#[tokio::test]
async fn find_origin_stops_at_the_detected_origin() {
    let dir = TempDir::new().expect("tempdir");
    let (_tx, rx) = watch::channel(false);

    let summary = crawler(
        profile_site(),
        CrawlPlan::find_origin(),
        options(),
        dir.path(),
        rx,
    )
    .run()
    .await;

    assert_eq!(summary.outcome, CrawlOutcome::OriginFound);
    let origin = summary.origin.expect("origin detected");
    assert_eq!(origin.origin, "https://site.test/staff");
    assert_eq!(origin.depth, 1);
    assert_eq!(origin.format.as_deref(), Some("https://site.test/user/####"));

    let out_log = fs::read_to_string(dir.path().join("out.log")).expect("out.log");
    assert!(out_log.contains("Found profile page origin at \"https://site.test/staff\""));
}

#[tokio::test]
async fn scrape_profiles_recrawls_the_origin_children() {
    let dir = TempDir::new().expect("tempdir");
    let (_tx, rx) = watch::channel(false);

    let summary = crawler(
        profile_site(),
        CrawlPlan::scrape_profiles(ScrapeOption::Html),
        options(),
        dir.path(),
        rx,
    )
    .run()
    .await;

    assert_eq!(summary.outcome, CrawlOutcome::Exhausted);
    assert!(summary.origin.is_some());

    // exactly the three profile pages were exported, with provenance tags
    let files = html_files(dir.path());
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f.contains("user")));
    let first = fs::read_to_string(dir.path().join("html").join(&files[0])).expect("read");
    assert!(first.contains("<profilescout>Source URL:"));

    let out_log = fs::read_to_string(dir.path().join("out.log")).expect("out.log");
    // the origin page itself is re-visited but skipped, not scraped
    assert!(out_log.contains("Skipped page: https://site.test/staff"));
    assert!(out_log.contains("Subcrawling of \"https://site.test/staff\" is complete"));
}

#[tokio::test]
async fn page_budget_stops_the_crawl() {
    let dir = TempDir::new().expect("tempdir");
    let (_tx, rx) = watch::channel(false);
    let visitor = StubVisitor::new()
        .page(BASE, r#"<a href="/a">a</a>"#)
        .page("https://site.test/a", "<html>a</html>");
    let options = CrawlOptions {
        max_pages: Some(1),
        ..options()
    };

    let summary = crawler(
        visitor,
        CrawlPlan::scrape_pages(ScrapeOption::Html),
        options,
        dir.path(),
        rx,
    )
    .run()
    .await;

    assert_eq!(summary.outcome, CrawlOutcome::BudgetReached);
    assert_eq!(summary.scraped, 1);
    assert_eq!(html_files(dir.path()).len(), 1);

    let out_log = fs::read_to_string(dir.path().join("out.log")).expect("out.log");
    assert!(out_log.contains("Maximum number of pages to scrape (1) reached"));
}

#[tokio::test]
async fn failed_pages_are_skipped_not_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let (_tx, rx) = watch::channel(false);
    let visitor = StubVisitor::new()
        .page(BASE, r#"<a href="/broken">broken</a><a href="/ok">ok</a>"#)
        .page("https://site.test/ok", "<html>ok</html>")
        .failing("https://site.test/broken");

    let summary = crawler(
        visitor,
        CrawlPlan::scrape_pages(ScrapeOption::Html),
        options(),
        dir.path(),
        rx,
    )
    .run()
    .await;

    assert_eq!(summary.outcome, CrawlOutcome::Exhausted);
    // the broken page is consumed but never counted as visited
    assert_eq!(summary.visited, 2);

    let err_log = fs::read_to_string(dir.path().join("err.log")).expect("err.log");
    assert!(err_log.contains("unreachable"));
}

#[tokio::test]
async fn shutdown_request_interrupts_the_crawl() {
    let dir = TempDir::new().expect("tempdir");
    let (_tx, rx) = watch::channel(true);

    let summary = crawler(
        profile_site(),
        CrawlPlan::scrape_pages(ScrapeOption::Html),
        options(),
        dir.path(),
        rx,
    )
    .run()
    .await;

    assert_eq!(summary.outcome, CrawlOutcome::Interrupted);
    assert_eq!(summary.visited, 0);

    let out_log = fs::read_to_string(dir.path().join("out.log")).expect("out.log");
    assert!(out_log.contains("Interrupted. Exiting..."));
    assert!(out_log.contains("is complete"));
}

#[tokio::test]
async fn buffered_logs_reach_disk_at_crawl_end() {
    let dir = TempDir::new().expect("tempdir");
    let (_tx, rx) = watch::channel(false);
    let visitor = StubVisitor::new().page(BASE, "<html>no links</html>");
    let options = CrawlOptions {
        use_buffer: true,
        ..options()
    };

    let summary = crawler(
        visitor,
        CrawlPlan::scrape_pages(ScrapeOption::Html),
        options,
        dir.path(),
        rx,
    )
    .run()
    .await;

    assert_eq!(summary.outcome, CrawlOutcome::Exhausted);
    let out_log = fs::read_to_string(dir.path().join("out.log")).expect("out.log");
    assert!(out_log.contains("0 https://site.test/"));
}
