//! The crawl driver: ties frontier, detector and plan together into
//! the per-site step loop, including the nested origin re-crawl.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::config::CrawlOptions;
use crate::detector::{OriginDetector, OriginMatch};
use crate::export::{CrawlLog, SiteExporter};
use crate::frontier::Frontier;
use crate::page::{ActionContext, PageAction, ProfileClassifier};
use crate::plan::{CrawlPlan, FrontierDirective, OriginReaction};
use crate::visitor::PageVisitor;

/// Why a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// Queue ran dry within the depth bound.
    Exhausted,
    /// The max-page budget was hit.
    BudgetReached,
    /// A find-origin crawl got its answer.
    OriginFound,
    /// Shutdown was requested.
    Interrupted,
}

/// Machine-readable wrap-up of one crawl, reported by the worker pool.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub base_url: String,
    pub outcome: CrawlOutcome,
    pub visited: usize,
    pub scraped: usize,
    pub origin: Option<OriginMatch>,
    pub duration_secs: f64,
}

pub struct Crawler {
    visitor: Arc<dyn PageVisitor>,
    classifier: Arc<dyn ProfileClassifier>,
    plan: CrawlPlan,
    options: CrawlOptions,
    base_url: String,
    frontier: Frontier,
    detector: OriginDetector,
    exporter: SiteExporter,
    log: CrawlLog,
    shutdown: watch::Receiver<bool>,
    last_origin: Option<OriginMatch>,
}

impl Crawler {
    pub fn new(
        visitor: Arc<dyn PageVisitor>,
        classifier: Arc<dyn ProfileClassifier>,
        plan: CrawlPlan,
        options: CrawlOptions,
        base_url: String,
        export_path: PathBuf,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let exporter = SiteExporter::new(export_path);
        let log = match exporter.prepare(options.scraping) {
            Ok(()) => CrawlLog::for_export(exporter.export_path(), options.use_buffer),
            Err(e) => {
                eprintln!("ERROR: {e}, stderr and stdout will be used");
                CrawlLog::stdio()
            }
        };
        let frontier = Frontier::new(visitor.clone(), base_url.clone(), 0).with_limits(
            options.max_depth,
            options.max_pages,
            options.bump_relevant,
        );
        Self {
            visitor,
            classifier,
            plan,
            options,
            base_url,
            frontier,
            detector: OriginDetector::new(),
            exporter,
            log,
            shutdown,
            last_origin: None,
        }
    }

    /// Run the crawl to completion. Cleanup (log flush/close) happens
    /// exactly once, no matter how the loop ends.
    pub async fn run(mut self) -> CrawlSummary {
        info!(base_url = %self.base_url, export_path = ?self.exporter.export_path(), "crawl starting");
        let started = Instant::now();

        let outcome = self.crawl_loop().await;

        self.log
            .info(&format!("Crawling of {:?} is complete", self.base_url));
        self.log.close();
        info!(base_url = %self.base_url, ?outcome, "crawl finished");

        CrawlSummary {
            base_url: self.base_url.clone(),
            outcome,
            visited: self.frontier.visited().len(),
            scraped: self.frontier.scraped_count(),
            origin: self.last_origin.clone(),
            duration_secs: started.elapsed().as_secs_f64(),
        }
    }

    async fn crawl_loop(&mut self) -> CrawlOutcome {
        loop {
            if *self.shutdown.borrow() {
                self.log.info("Interrupted. Exiting...");
                return CrawlOutcome::Interrupted;
            }
            if !self.frontier.has_next() {
                self.log.info(&format!(
                    "All links at a depth of {} have been visited. Stopping the crawling...",
                    self.frontier.max_depth()
                ));
                return CrawlOutcome::Exhausted;
            }

            // failed or binary pages are consumed and skipped
            let Some(page) = self.frontier.visit_next(&mut self.log).await else {
                continue;
            };
            self.log.page(page.link.depth, &page.link.url);

            let stage = *self.plan.current();
            let mut ctx = ActionContext {
                visitor: self.visitor.as_ref(),
                classifier: self.classifier.as_ref(),
                exporter: &self.exporter,
                log: &mut self.log,
                resolution: self.options.resolution,
            };
            let result = stage.action.execute(&page, &mut ctx).await;

            if result.successful {
                self.frontier.increase_count();
                if self.frontier.is_page_max_reached() {
                    self.report_budget_reached(page.link.depth);
                    return CrawlOutcome::BudgetReached;
                }
            } else {
                self.log.error(&format!(
                    "Failed to perform action for: {} ({})",
                    page.link.url, result.message
                ));
            }

            if result.profile_detected == Some(true) {
                if let Some(origin) = self.detector.observe(&page.link).cloned() {
                    self.log
                        .info(&format!("Found profile page origin at {:?}", origin.origin));
                    self.last_origin = Some(origin.clone());
                    match stage.on_origin {
                        Some(OriginReaction::StopCrawl) => return CrawlOutcome::OriginFound,
                        Some(OriginReaction::Transition(transition)) => {
                            let directive = transition(&self.options, &origin);
                            if let Some(action) = self.plan.transition_action() {
                                self.run_subcrawl(directive, action).await;
                            }
                            self.detector.reset();
                            if self.frontier.is_page_max_reached() {
                                self.report_budget_reached(page.link.depth);
                                return CrawlOutcome::BudgetReached;
                            }
                        }
                        None => {}
                    }
                }
            }

            self.frontier.queue_sublinks(
                &page,
                self.options.include_fragment,
                None,
                false,
                &mut self.log,
            );
            self.log.flush();
            self.politeness_sleep().await;
        }
    }

    /// Sequentially nested re-crawl of a detected origin. Shares this
    /// crawl's log and exporter; runs on a fresh frontier whose visited
    /// links are merged back afterwards.
    async fn run_subcrawl(&mut self, directive: FrontierDirective, action: PageAction) {
        let root_url = directive.new_root.url.clone();
        let mut sub = Frontier::new(self.visitor.clone(), self.base_url.clone(), 0).with_limits(
            directive.depth_cap,
            self.options.max_pages,
            self.options.bump_relevant,
        );
        sub.clear_history(directive.new_root);

        let mut skip_first_page = directive.skip_first_page;
        let mut pages_seen = 0usize;
        loop {
            if *self.shutdown.borrow() || !sub.has_next() {
                break;
            }
            let Some(page) = sub.visit_next(&mut self.log).await else {
                continue;
            };
            self.log.page(page.link.depth, &page.link.url);

            if skip_first_page {
                skip_first_page = false;
                self.log
                    .info(&format!("Skipped page: {}", page.link.url));
            } else {
                let mut ctx = ActionContext {
                    visitor: self.visitor.as_ref(),
                    classifier: self.classifier.as_ref(),
                    exporter: &self.exporter,
                    log: &mut self.log,
                    resolution: self.options.resolution,
                };
                let result = action.execute(&page, &mut ctx).await;
                if result.successful {
                    sub.increase_count();
                    if sub.is_page_max_reached() {
                        break;
                    }
                } else {
                    self.log.error(&format!(
                        "Failed to perform action for: {} ({})",
                        page.link.url, result.message
                    ));
                }
            }

            let may_queue = directive
                .skip_sublinks_after
                .map(|n| pages_seen < n)
                .unwrap_or(true);
            if may_queue {
                sub.queue_sublinks(
                    &page,
                    self.options.include_fragment,
                    directive.sublink_filter.as_ref(),
                    directive.structural_links,
                    &mut self.log,
                );
            }
            pages_seen += 1;
            self.log.flush();
            self.politeness_sleep().await;
        }

        let sub_visited = sub.visited().clone();
        self.frontier.mark_as_visited(&sub_visited, sub.scraped_count());
        self.log
            .info(&format!("Subcrawling of {root_url:?} is complete"));
    }

    fn report_budget_reached(&mut self, current_depth: u32) {
        let max_pages = self.options.max_pages.unwrap_or(0);
        self.log.info(&format!(
            "Maximum number of pages to scrape ({max_pages}) reached. Stopping the crawling..."
        ));
        self.log.info(&format!(
            "There were {} unvisited links in the queue",
            self.frontier.queued_count()
        ));
        self.log
            .info(&format!("Current depth: {current_depth}"));
    }

    async fn politeness_sleep(&mut self) {
        let sleep = Duration::from_secs(self.options.crawl_sleep_secs);
        if sleep.is_zero() {
            return;
        }
        // wake early when shutdown is requested
        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}
