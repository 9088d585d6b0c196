pub mod cli;
pub mod config;
pub mod crawler;
pub mod detector;
pub mod export;
pub mod format;
pub mod frontier;
pub mod links;
pub mod logging;
pub mod page;
pub mod plan;
pub mod url_utils;
pub mod visitor;

// Re-export main types for library usage
pub use config::{Config, CrawlOptions};
pub use crawler::{CrawlOutcome, CrawlSummary, Crawler};
pub use detector::{OriginDetector, OriginMatch};
pub use export::{CrawlLog, SiteExporter};
pub use format::{most_common_format, FormatMatcher};
pub use frontier::Frontier;
pub use links::PageLink;
pub use page::{Page, PageAction, ProfileClassifier, ScrapeOption, UrlKeywordClassifier};
pub use plan::{CrawlAction, CrawlPlan};
pub use visitor::{HttpVisitor, PageVisitor, VisitError};
