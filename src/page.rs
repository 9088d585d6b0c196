//! Fetched-page model and the per-page actions a crawl stage can run.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::export::{CrawlLog, SiteExporter};
use crate::links::PageLink;
use crate::visitor::PageVisitor;

/// Coarse content classification from the response content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Text,
    Binary,
}

impl ContentKind {
    pub fn is_text(self) -> bool {
        matches!(self, Self::Html | Self::Text)
    }
}

/// A successfully fetched page, ready for actions and link extraction.
#[derive(Debug, Clone)]
pub struct Page {
    pub link: PageLink,
    pub kind: ContentKind,
    pub html: String,
}

impl Page {
    /// Page source prefixed with provenance tags, so an exported file
    /// records where it was found and through which anchor.
    pub fn tagged_html(&self) -> String {
        format!(
            "<profilescout>Source URL:{}</profilescout>\n\
             <profilescout>Source text:{}</profilescout>\n\n{}",
            self.link.url, self.link.anchor_text, self.html
        )
    }
}

/// Which artifacts a scrape writes for each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum ScrapeOption {
    All,
    Html,
    Screenshot,
}

impl ScrapeOption {
    pub fn wants_html(self) -> bool {
        matches!(self, Self::All | Self::Html)
    }

    pub fn wants_screenshot(self) -> bool {
        matches!(self, Self::All | Self::Screenshot)
    }
}

/// Decides whether a fetched page is a profile page.
///
/// The real classifier is an external capability; the bundled
/// implementations cover tests and keyword-based heuristics.
pub trait ProfileClassifier: Send + Sync {
    fn predict(&self, page: &Page) -> bool;
}

/// Baseline heuristic: the page URL contains a profile-ish keyword and
/// ends in something that looks like an identifier segment.
pub struct UrlKeywordClassifier {
    keywords: Vec<String>,
}

impl UrlKeywordClassifier {
    pub fn new() -> Self {
        Self {
            keywords: ["profile", "profil", "user", "member", "staff", "people"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for UrlKeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileClassifier for UrlKeywordClassifier {
    fn predict(&self, page: &Page) -> bool {
        let lower = page.link.url.to_lowercase();
        self.keywords.iter().any(|kw| lower.contains(kw.as_str()))
            && page.link.parent_url.is_some()
    }
}

/// Outcome of a page action; failures are reported here rather than as
/// errors so one bad page never aborts the crawl.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub successful: bool,
    pub profile_detected: Option<bool>,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            successful: true,
            profile_detected: None,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            profile_detected: None,
            message: message.into(),
        }
    }
}

/// Everything an action may need, borrowed from the driver for the
/// duration of one page.
pub struct ActionContext<'a> {
    pub visitor: &'a dyn PageVisitor,
    pub classifier: &'a dyn ProfileClassifier,
    pub exporter: &'a SiteExporter,
    pub log: &'a mut CrawlLog,
    pub resolution: (u32, u32),
}

/// The action a crawl stage applies to every visited page.
#[derive(Debug, Clone, Copy)]
pub enum PageAction {
    /// Export the page's artifacts (html and/or screenshot).
    ScrapePage { scrape: ScrapeOption },
    /// Run the profile classifier and report the verdict.
    ClassifyProfile,
}

impl PageAction {
    pub async fn execute(&self, page: &Page, ctx: &mut ActionContext<'_>) -> ActionResult {
        match self {
            Self::ScrapePage { scrape } => scrape_page(page, *scrape, ctx).await,
            Self::ClassifyProfile => classify_profile(page, ctx),
        }
    }
}

async fn scrape_page(page: &Page, scrape: ScrapeOption, ctx: &mut ActionContext<'_>) -> ActionResult {
    if scrape.wants_screenshot() {
        match ctx.visitor.capture_screenshot(&page.link, ctx.resolution).await {
            Ok(png) => match ctx.exporter.save_screenshot(&page.link, &png, ctx.log) {
                Ok(_) => {}
                Err(e) => {
                    return ActionResult::failed(format!(
                        "failed to store screenshot for {}: {e}",
                        page.link.url
                    ))
                }
            },
            Err(e) => {
                return ActionResult::failed(format!(
                    "failed to capture screenshot for {}: {e}",
                    page.link.url
                ))
            }
        }
    }

    if scrape.wants_html() {
        if let Err(e) = ctx.exporter.save_html(&page.link, &page.tagged_html(), ctx.log) {
            return ActionResult::failed(format!("failed to store html for {}: {e}", page.link.url));
        }
    }

    ActionResult::ok("page scraped")
}

fn classify_profile(page: &Page, ctx: &mut ActionContext<'_>) -> ActionResult {
    let detected = ctx.classifier.predict(page);
    if detected {
        ctx.log.info(&format!("Detected as profile page: {}", page.link.url));
    }
    ActionResult {
        successful: true,
        profile_detected: Some(detected),
        message: "inference performed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, parent: Option<&str>) -> Page {
        let mut link = PageLink::new(url, 1);
        link.parent_url = parent.map(str::to_string);
        Page {
            link,
            kind: ContentKind::Html,
            html: "<html><body>hello</body></html>".to_string(),
        }
    }

    #[test]
    fn test_tagged_html_carries_provenance() {
        let mut p = page("https://example.com/user/1", Some("https://example.com/staff"));
        p.link.anchor_text = "Jane Doe".to_string();
        let tagged = p.tagged_html();
        assert!(tagged.contains("<profilescout>Source URL:https://example.com/user/1</profilescout>"));
        assert!(tagged.contains("<profilescout>Source text:Jane Doe</profilescout>"));
        assert!(tagged.ends_with("<html><body>hello</body></html>"));
    }

    #[test]
    fn test_scrape_option_artifacts() {
        assert!(ScrapeOption::All.wants_html());
        assert!(ScrapeOption::All.wants_screenshot());
        assert!(ScrapeOption::Html.wants_html());
        assert!(!ScrapeOption::Html.wants_screenshot());
        assert!(!ScrapeOption::Screenshot.wants_html());
    }

    #[test]
    fn test_url_keyword_classifier() {
        let classifier = UrlKeywordClassifier::new();
        assert!(classifier.predict(&page(
            "https://example.com/user/123",
            Some("https://example.com/staff")
        )));
        assert!(!classifier.predict(&page("https://example.com/news/2024", Some("https://example.com/"))));
        // pages without a parent are never counted as profiles
        assert!(!classifier.predict(&page("https://example.com/user/123", None)));
    }

    #[test]
    fn test_content_kind() {
        assert!(ContentKind::Html.is_text());
        assert!(ContentKind::Text.is_text());
        assert!(!ContentKind::Binary.is_text());
    }
}
