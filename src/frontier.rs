//! Crawl frontier: the FIFO queue of links to visit, the visited set
//! and the bookkeeping that keeps a crawl bounded.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::config::Config;
use crate::export::CrawlLog;
use crate::format::FormatMatcher;
use crate::links::{self, PageLink};
use crate::page::Page;
use crate::visitor::PageVisitor;

pub struct Frontier {
    visitor: Arc<dyn PageVisitor>,
    base_url: String,
    max_depth: u32,
    max_pages: Option<usize>,
    bump_relevant: bool,
    visited: HashSet<String>,
    to_visit: VecDeque<PageLink>,
    scraped_count: usize,
}

impl Frontier {
    pub fn new(visitor: Arc<dyn PageVisitor>, base_url: impl Into<String>, base_depth: u32) -> Self {
        let base_url = base_url.into();
        let mut to_visit = VecDeque::new();
        to_visit.push_back(PageLink::new(base_url.clone(), base_depth));
        Self {
            visitor,
            base_url,
            max_depth: Config::DEFAULT_MAX_DEPTH,
            max_pages: None,
            bump_relevant: false,
            visited: HashSet::new(),
            to_visit,
            scraped_count: 0,
        }
    }

    pub fn with_limits(
        mut self,
        max_depth: u32,
        max_pages: Option<usize>,
        bump_relevant: bool,
    ) -> Self {
        self.max_depth = max_depth;
        self.max_pages = max_pages;
        self.bump_relevant = bump_relevant;
        self
    }

    pub fn has_next(&self) -> bool {
        !self.to_visit.is_empty()
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Take the next link off the queue and fetch it.
    ///
    /// Returns `None` when the queue is empty, the fetch failed (the
    /// link is consumed and stays unvisited) or the content is binary
    /// (the link counts as visited but the page is unusable).
    pub async fn visit_next(&mut self, log: &mut CrawlLog) -> Option<Page> {
        let link = self.to_visit.pop_front()?;
        let page = match self.visitor.visit(&link).await {
            Ok(page) => page,
            Err(e) => {
                log.error(&format!("Failed to visit {:?} (reason: {})", link.url, e.reason()));
                log.warn(&format!("{} {}", e.reason(), link.url));
                return None;
            }
        };

        self.visited.insert(link.url.clone());
        if !page.kind.is_text() {
            return None;
        }
        Some(page)
    }

    /// Extract the page's sublinks, run them through the filter
    /// pipeline and append the survivors to the queue.
    ///
    /// Returns `None` without touching the queue when the page already
    /// sits at the depth bound, otherwise the number of links added.
    pub fn queue_sublinks(
        &mut self,
        page: &Page,
        include_fragment: bool,
        sublink_filter: Option<&FormatMatcher>,
        from_structure: bool,
        log: &mut CrawlLog,
    ) -> Option<usize> {
        if page.link.depth >= self.max_depth {
            return None;
        }

        let hops = self
            .visitor
            .extract_links(page, &self.base_url, include_fragment, from_structure);
        let hops = hops
            .into_iter()
            .map(|mut pl| {
                pl.url = crate::url_utils::to_absolute(&pl.url, &self.base_url, &page.link.url);
                pl
            })
            .collect();

        let valid = links::filter_out_invalid(hops, &self.base_url);
        let not_visited = links::filter_out_visited(valid, &self.visited);
        let new_links = links::filter_out_present(not_visited, self.to_visit.iter());
        let (new_links, too_long) = links::filter_out_long(new_links);
        for dropped in &too_long {
            log.warn(&format!(
                "url={:?} is too long and may not be relevant. Ignored",
                dropped.url
            ));
        }
        let mut new_links = links::remove_duplicates(new_links);
        if let Some(matcher) = sublink_filter {
            new_links.retain(|pl| matcher.matches(&pl.url));
        }

        let added = new_links.len();
        self.to_visit.extend(new_links);
        if self.bump_relevant {
            let queued: Vec<PageLink> = self.to_visit.drain(..).collect();
            self.to_visit = links::prioritize_relevant(queued).into();
        }
        Some(added)
    }

    /// Restart the frontier from a single link, forgetting all visited
    /// and queued state. Used to seed sub-crawls.
    pub fn clear_history(&mut self, root: PageLink) {
        self.scraped_count = 0;
        self.visited.clear();
        self.to_visit.clear();
        self.to_visit.push_back(root);
    }

    /// Merge a finished sub-crawl back: its visited links stop being
    /// crawlable here and its scrape count accrues to this frontier.
    pub fn mark_as_visited(&mut self, urls: &HashSet<String>, scraped_count: usize) {
        self.scraped_count += scraped_count;
        self.to_visit.retain(|pl| !urls.contains(&pl.url));
        self.visited.extend(urls.iter().cloned());
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn queued_count(&self) -> usize {
        self.to_visit.len()
    }

    pub fn scraped_count(&self) -> usize {
        self.scraped_count
    }

    pub fn increase_count(&mut self) -> usize {
        self.scraped_count += 1;
        self.scraped_count
    }

    pub fn is_page_max_reached(&self) -> bool {
        self.max_pages
            .map(|max| self.scraped_count >= max)
            .unwrap_or(false)
    }
}
