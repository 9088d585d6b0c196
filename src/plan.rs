//! Crawl plans: which action runs at each stage of a crawl and how the
//! frontier is reconfigured when an origin page is found.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::{Config, CrawlOptions};
use crate::detector::OriginMatch;
use crate::format::FormatMatcher;
use crate::links::PageLink;
use crate::page::{PageAction, ScrapeOption};

/// Top-level crawl modes selectable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum CrawlAction {
    /// Scrape every visited page.
    ScrapePages,
    /// Stop as soon as a profile-page origin is detected.
    FindOrigin,
    /// Detect profile-page origins and scrape their children.
    ScrapeProfiles,
}

/// Instructions a stage transition hands back to the driver instead of
/// reaching into frontier internals: where the re-crawl starts, how it
/// is bounded and which sublinks it accepts.
#[derive(Debug)]
pub struct FrontierDirective {
    pub new_root: PageLink,
    pub depth_cap: u32,
    pub sublink_filter: Option<FormatMatcher>,
    /// Stop queueing sublinks after this many visited pages, so the
    /// re-crawl only fans out from the origin itself.
    pub skip_sublinks_after: Option<usize>,
    /// Mine sublinks from list-like page structure only.
    pub structural_links: bool,
    /// The first page of the re-crawl was already processed by the
    /// parent crawl and must not be acted on again.
    pub skip_first_page: bool,
}

/// Builds the directive for re-crawling a detected origin: reseed at
/// the origin one level up, cap depth to its immediate children, accept
/// only links matching the mined format and do not recurse past the
/// origin's own sublinks.
pub fn origin_recrawl_directive(_options: &CrawlOptions, origin: &OriginMatch) -> FrontierDirective {
    let sublink_filter = origin
        .format
        .as_deref()
        .and_then(|fmt| FormatMatcher::new(fmt, Config::PLACEHOLDER).ok());
    FrontierDirective {
        new_root: PageLink::new(origin.origin.clone(), origin.depth),
        depth_cap: origin.depth + 1,
        sublink_filter,
        skip_sublinks_after: Some(1),
        structural_links: true,
        skip_first_page: true,
    }
}

pub type StageTransition = fn(&CrawlOptions, &OriginMatch) -> FrontierDirective;

/// What the driver does when the origin detector fires during a stage.
#[derive(Clone, Copy)]
pub enum OriginReaction {
    /// The crawl's purpose is fulfilled; stop.
    StopCrawl,
    /// Reconfigure per the transition and run the next stage's action
    /// over the re-seeded frontier.
    Transition(StageTransition),
}

/// One phase of a crawl: the per-page action plus the reaction to an
/// origin detection, when this stage cares about origins at all.
#[derive(Clone, Copy)]
pub struct Stage {
    pub action: PageAction,
    pub on_origin: Option<OriginReaction>,
}

impl Stage {
    pub fn detects_origins(&self) -> bool {
        self.on_origin.is_some()
    }
}

/// Ordered stages of one logical crawl. The index only moves forward.
pub struct CrawlPlan {
    stages: Vec<Stage>,
    index: usize,
}

impl CrawlPlan {
    pub fn for_action(action: CrawlAction, scrape: ScrapeOption) -> Self {
        match action {
            CrawlAction::ScrapePages => Self::scrape_pages(scrape),
            CrawlAction::FindOrigin => Self::find_origin(),
            CrawlAction::ScrapeProfiles => Self::scrape_profiles(scrape),
        }
    }

    pub fn scrape_pages(scrape: ScrapeOption) -> Self {
        Self {
            stages: vec![Stage {
                action: PageAction::ScrapePage { scrape },
                on_origin: None,
            }],
            index: 0,
        }
    }

    pub fn find_origin() -> Self {
        Self {
            stages: vec![Stage {
                action: PageAction::ClassifyProfile,
                on_origin: Some(OriginReaction::StopCrawl),
            }],
            index: 0,
        }
    }

    pub fn scrape_profiles(scrape: ScrapeOption) -> Self {
        Self {
            stages: vec![
                Stage {
                    action: PageAction::ClassifyProfile,
                    on_origin: Some(OriginReaction::Transition(origin_recrawl_directive)),
                },
                Stage {
                    action: PageAction::ScrapePage { scrape },
                    on_origin: None,
                },
            ],
            index: 0,
        }
    }

    pub fn current(&self) -> &Stage {
        &self.stages[self.index.min(self.stages.len() - 1)]
    }

    /// Action the post-transition stage applies, if the plan has one.
    pub fn transition_action(&self) -> Option<PageAction> {
        self.stages.get(self.index + 1).map(|s| s.action)
    }

    /// Move to the next stage. Returns false once no stages remain.
    pub fn advance(&mut self) -> bool {
        if self.index + 1 < self.stages.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn stage_index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin_match(format: Option<&str>) -> OriginMatch {
        OriginMatch {
            origin: "https://example.com/staff".to_string(),
            depth: 1,
            format: format.map(str::to_string),
        }
    }

    #[test]
    fn test_scrape_pages_plan_never_reacts_to_origins() {
        let plan = CrawlPlan::scrape_pages(ScrapeOption::All);
        assert!(!plan.current().detects_origins());
        assert!(plan.transition_action().is_none());
    }

    #[test]
    fn test_find_origin_plan_stops_on_detection() {
        let plan = CrawlPlan::find_origin();
        assert!(matches!(
            plan.current().on_origin,
            Some(OriginReaction::StopCrawl)
        ));
    }

    #[test]
    fn test_scrape_profiles_plan_transitions_into_scraping() {
        let plan = CrawlPlan::scrape_profiles(ScrapeOption::Html);
        assert!(matches!(plan.current().action, PageAction::ClassifyProfile));
        assert!(matches!(
            plan.current().on_origin,
            Some(OriginReaction::Transition(_))
        ));
        assert!(matches!(
            plan.transition_action(),
            Some(PageAction::ScrapePage {
                scrape: ScrapeOption::Html
            })
        ));
    }

    #[test]
    fn test_stage_index_is_monotonic() {
        let mut plan = CrawlPlan::scrape_profiles(ScrapeOption::All);
        assert_eq!(plan.stage_index(), 0);
        assert!(plan.advance());
        assert_eq!(plan.stage_index(), 1);
        assert!(!plan.advance());
        assert_eq!(plan.stage_index(), 1);
    }

    #[test]
    fn test_origin_recrawl_directive() {
        let options = CrawlOptions::default();
        let directive =
            origin_recrawl_directive(&options, &origin_match(Some("https://example.com/user/####")));
        assert_eq!(directive.new_root.url, "https://example.com/staff");
        assert_eq!(directive.new_root.depth, 1);
        assert_eq!(directive.depth_cap, 2);
        assert_eq!(directive.skip_sublinks_after, Some(1));
        assert!(directive.structural_links);
        assert!(directive.skip_first_page);
        let matcher = directive.sublink_filter.expect("filter from mined format");
        assert!(matcher.matches("https://example.com/user/42"));
        assert!(!matcher.matches("https://example.com/news"));
    }

    #[test]
    fn test_directive_without_mined_format_has_no_filter() {
        let options = CrawlOptions::default();
        let directive = origin_recrawl_directive(&options, &origin_match(None));
        assert!(directive.sublink_filter.is_none());
    }
}
