//! Page-visiting capability: an object-safe trait the crawler drives,
//! plus the HTTP implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::links::PageLink;
use crate::page::{ContentKind, Page};
use crate::url_utils;

/// Classified reasons a page visit can fail. The reason string is what
/// ends up in the per-crawl log next to the skipped URL.
#[derive(Debug, Error)]
pub enum VisitError {
    #[error("site cannot be resolved")]
    Unresolved,

    #[error("site cannot be reached")]
    Unreachable,

    #[error("request timed out")]
    TimedOut,

    #[error("page element went stale during processing")]
    StaleReference,

    #[error("https is not supported for this site")]
    TlsUnsupported,

    #[error("this visitor cannot capture screenshots")]
    ScreenshotUnsupported,

    #[error("visit failed: {0}")]
    Other(String),
}

impl VisitError {
    /// Short reason tag used in log lines.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Unreachable => "unreachable",
            Self::TimedOut => "timed out",
            Self::StaleReference => "stale",
            Self::TlsUnsupported => "https not supported",
            Self::ScreenshotUnsupported => "screenshot not supported",
            Self::Other(_) => "unknown",
        }
    }
}

/// How pages are fetched and picked apart. Implemented over HTTP in
/// production and by stubs in tests.
#[async_trait]
pub trait PageVisitor: Send + Sync {
    /// Fetch the page behind a link.
    async fn visit(&self, link: &PageLink) -> Result<Page, VisitError>;

    /// Capture a screenshot of the page behind a link, if the visitor
    /// is capable of rendering at all.
    async fn capture_screenshot(
        &self,
        link: &PageLink,
        resolution: (u32, u32),
    ) -> Result<Vec<u8>, VisitError> {
        let _ = (link, resolution);
        Err(VisitError::ScreenshotUnsupported)
    }

    /// Pull candidate sublinks out of a fetched page. Hrefs are kept as
    /// written; absolutization happens in the frontier.
    fn extract_links(
        &self,
        page: &Page,
        base_url: &str,
        include_fragment: bool,
        from_structure: bool,
    ) -> Vec<PageLink> {
        extract_links(page, base_url, include_fragment, from_structure)
    }
}

/// Map a content-type header onto the coarse page kind.
pub fn content_kind(content_type: Option<&str>) -> ContentKind {
    match content_type {
        Some(ct) if url_utils::is_html_content_type(ct) => ContentKind::Html,
        Some(ct) if url_utils::is_plain_text_content_type(ct) => ContentKind::Text,
        _ => ContentKind::Binary,
    }
}

/// Anchor extraction shared by every visitor.
pub fn extract_links(
    page: &Page,
    base_url: &str,
    include_fragment: bool,
    from_structure: bool,
) -> Vec<PageLink> {
    let document = Html::parse_document(&page.html);
    let selector_src = if from_structure {
        "table a[href], ol a[href], ul a[href], section a[href]"
    } else {
        "a[href]"
    };
    let Ok(selector) = Selector::parse(selector_src) else {
        return Vec::new();
    };

    let mut seen: Vec<String> = Vec::new();
    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        if from_structure && has_navigational_ancestor(&anchor) {
            continue;
        }
        let Some(raw_href) = anchor.value().attr("href") else {
            continue;
        };
        let mut href = raw_href.trim().to_string();

        // cache busters carry no distinct content
        if let Some(idx) = href.find("?nocache") {
            href.truncate(idx);
        }
        if !include_fragment {
            if let Some(idx) = href.find('#') {
                href.truncate(idx);
            }
        }

        if seen.contains(&href) || !url_utils::is_valid(&href, base_url) {
            continue;
        }
        seen.push(href.clone());

        let anchor_text = anchor.text().collect::<String>().trim().to_string();
        links.push(PageLink {
            url: href,
            depth: page.link.depth + 1,
            parent_url: Some(page.link.url.clone()),
            anchor_text,
        });
    }
    links
}

/// Structural extraction skips anchors living inside navigation chrome:
/// header/footer/nav elements, or divs labelled as such.
fn has_navigational_ancestor(anchor: &ElementRef<'_>) -> bool {
    for node in anchor.ancestors() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();
        if matches!(name, "header" | "footer" | "nav") {
            return true;
        }
        if name == "div" {
            let labelled = |attr: &str| {
                element
                    .value()
                    .attr(attr)
                    .map(|v| {
                        let v = v.to_ascii_lowercase();
                        v.contains("nav") || v.contains("footer")
                    })
                    .unwrap_or(false)
            };
            if labelled("id") || labelled("class") || labelled("role") {
                return true;
            }
        }
    }
    false
}

/// HTTP-backed visitor. A failed fetch is retried exactly once after a
/// long cooldown; the second failure is classified and propagated.
pub struct HttpVisitor {
    client: reqwest::Client,
    retry_cooldown: Duration,
}

impl HttpVisitor {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(Config::USER_AGENT)
            .timeout(Duration::from_secs(Config::FETCH_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(Config::CONNECT_TIMEOUT_SECS))
            .http1_only()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            retry_cooldown: Duration::from_secs(Config::RETRY_COOLDOWN_SECS),
        })
    }

    #[cfg(test)]
    fn with_cooldown(cooldown: Duration) -> Result<Self, reqwest::Error> {
        let mut visitor = Self::new()?;
        visitor.retry_cooldown = cooldown;
        Ok(visitor)
    }

    async fn fetch_once(&self, url: &str) -> Result<Page, VisitError> {
        let response = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(classify_error)?;

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let kind = content_kind(content_type.as_deref());

        // binary bodies are never used, skip downloading them
        let html = if kind.is_text() {
            response
                .text()
                .await
                .map_err(|e| VisitError::Other(e.to_string()))?
        } else {
            String::new()
        };

        Ok(Page {
            link: PageLink::new(url, 0),
            kind,
            html,
        })
    }
}

#[async_trait]
impl PageVisitor for HttpVisitor {
    async fn visit(&self, link: &PageLink) -> Result<Page, VisitError> {
        let page = match self.fetch_once(&link.url).await {
            Ok(page) => page,
            Err(first) => {
                debug!(url = %link.url, error = %first, "fetch failed, retrying after cooldown");
                tokio::time::sleep(self.retry_cooldown).await;
                self.fetch_once(&link.url).await?
            }
        };
        Ok(Page {
            link: link.clone(),
            ..page
        })
    }
}

fn classify_error(error: reqwest::Error) -> VisitError {
    if error.is_timeout() {
        return VisitError::TimedOut;
    }
    let message = error.to_string().to_lowercase();
    if message.contains("dns") || message.contains("name resolution") || message.contains("resolve")
    {
        return VisitError::Unresolved;
    }
    if message.contains("ssl") || message.contains("tls") || message.contains("certificate") {
        return VisitError::TlsUnsupported;
    }
    if error.is_connect()
        || message.contains("connection refused")
        || message.contains("unreachable")
    {
        return VisitError::Unreachable;
    }
    VisitError::Other(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_page(url: &str, depth: u32, html: &str) -> Page {
        Page {
            link: PageLink::new(url, depth),
            kind: ContentKind::Html,
            html: html.to_string(),
        }
    }

    const BASE: &str = "https://example.com/";

    #[test]
    fn test_extract_links_basic() {
        let page = html_page(
            "https://example.com/staff",
            1,
            r#"<html><body>
                <a href="/people/jane">Jane Doe</a>
                <a href="https://example.com/people/john">John</a>
                <a href="https://other.com/x">offsite</a>
                <a href="mailto:jane@example.com">mail</a>
            </body></html>"#,
        );
        let links = extract_links(&page, BASE, false, false);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "/people/jane");
        assert_eq!(links[0].depth, 2);
        assert_eq!(links[0].parent_url.as_deref(), Some("https://example.com/staff"));
        assert_eq!(links[0].anchor_text, "Jane Doe");
        assert_eq!(links[1].url, "https://example.com/people/john");
    }

    #[test]
    fn test_extract_links_strips_fragment_and_nocache() {
        let page = html_page(
            "https://example.com/",
            0,
            r#"<a href="/page#section">a</a>
               <a href="/page?nocache=1">b</a>"#,
        );
        let links = extract_links(&page, BASE, false, false);
        // both collapse to "/page" and the duplicate is dropped
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "/page");
    }

    #[test]
    fn test_extract_links_keeps_fragment_when_asked() {
        let page = html_page("https://example.com/", 0, r#"<a href="/page#section">a</a>"#);
        let links = extract_links(&page, BASE, true, false);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "/page#section");
    }

    #[test]
    fn test_extract_links_dedups_within_page() {
        let page = html_page(
            "https://example.com/",
            0,
            r#"<a href="/a">one</a><a href="/a">two</a><a href="/b">three</a>"#,
        );
        let links = extract_links(&page, BASE, false, false);
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_structural_extraction_only_takes_list_like_containers() {
        let page = html_page(
            "https://example.com/staff",
            1,
            r#"<html><body>
                <p><a href="/loose">loose</a></p>
                <ul><li><a href="/people/1">one</a></li></ul>
                <table><tr><td><a href="/people/2">two</a></td></tr></table>
            </body></html>"#,
        );
        let links = extract_links(&page, BASE, false, true);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["/people/1", "/people/2"]);
    }

    #[test]
    fn test_structural_extraction_skips_navigation_chrome() {
        let page = html_page(
            "https://example.com/staff",
            1,
            r#"<html><body>
                <nav><ul><li><a href="/home">home</a></li></ul></nav>
                <footer><ul><li><a href="/imprint">imprint</a></li></ul></footer>
                <div class="main-navigation"><ul><li><a href="/news">news</a></li></ul></div>
                <div id="page-footer"><ul><li><a href="/legal">legal</a></li></ul></div>
                <div role="navigation"><ul><li><a href="/map">map</a></li></ul></div>
                <section><a href="/people/1">one</a></section>
            </body></html>"#,
        );
        let links = extract_links(&page, BASE, false, true);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["/people/1"]);
    }

    #[test]
    fn test_content_kind_mapping() {
        assert_eq!(content_kind(Some("text/html; charset=utf-8")), ContentKind::Html);
        assert_eq!(content_kind(Some("text/plain")), ContentKind::Text);
        assert_eq!(content_kind(Some("application/pdf")), ContentKind::Binary);
        assert_eq!(content_kind(None), ContentKind::Binary);
    }

    #[test]
    fn test_visit_error_reasons() {
        assert_eq!(VisitError::Unresolved.reason(), "unresolved");
        assert_eq!(VisitError::TimedOut.reason(), "timed out");
        assert_eq!(VisitError::TlsUnsupported.reason(), "https not supported");
    }

    #[tokio::test]
    async fn test_http_visitor_rejects_unresolvable_host() {
        let visitor =
            HttpVisitor::with_cooldown(Duration::from_millis(1)).expect("client builds");
        let link = PageLink::new("http://definitely-not-a-real-host.invalid/", 0);
        let result = visitor.visit(&link).await;
        assert!(result.is_err());
    }
}
