//! Link records and the filter pipeline applied before queueing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::url_utils;

/// A link discovered during the crawl, with enough provenance to
/// reconstruct where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub url: String,
    pub depth: u32,
    pub parent_url: Option<String>,
    #[serde(default)]
    pub anchor_text: String,
}

impl PageLink {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            parent_url: None,
            anchor_text: String::new(),
        }
    }

    pub fn with_parent(url: impl Into<String>, depth: u32, parent_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth,
            parent_url: Some(parent_url.into()),
            anchor_text: String::new(),
        }
    }

    /// The page this link attributes its origin to: the parent if one
    /// is recorded, the link itself otherwise.
    pub fn origin_url(&self) -> &str {
        self.parent_url.as_deref().unwrap_or(&self.url)
    }
}

/// Collapse repeated URLs, keeping first-seen order and the smallest
/// depth observed for each URL.
pub fn remove_duplicates(page_links: Vec<PageLink>) -> Vec<PageLink> {
    let mut unique: Vec<PageLink> = Vec::with_capacity(page_links.len());
    for link in page_links {
        match unique.iter_mut().find(|u| u.url == link.url) {
            Some(existing) => {
                if existing.depth > link.depth {
                    existing.depth = link.depth;
                }
            }
            None => unique.push(link),
        }
    }
    unique
}

pub fn filter_out_invalid(page_links: Vec<PageLink>, base_url: &str) -> Vec<PageLink> {
    page_links
        .into_iter()
        .filter(|pl| url_utils::is_valid(&pl.url, base_url))
        .collect()
}

/// Drop links already visited. Comparison tolerates the "www" prefix in
/// either direction so the same page is not crawled twice under two
/// spellings.
pub fn filter_out_visited(page_links: Vec<PageLink>, visited: &HashSet<String>) -> Vec<PageLink> {
    page_links
        .into_iter()
        .filter(|pl| {
            let (with_www, without_www) = url_utils::with_and_without_www(&pl.url);
            !visited.contains(&pl.url)
                && !visited.contains(&with_www)
                && !visited.contains(&without_www)
        })
        .collect()
}

/// Drop links that are already waiting in the queue, again tolerating
/// the "www" prefix.
pub fn filter_out_present<'a, I>(page_links: Vec<PageLink>, to_visit: I) -> Vec<PageLink>
where
    I: IntoIterator<Item = &'a PageLink>,
{
    let mut queued = HashSet::new();
    for link in to_visit {
        let (with_www, without_www) = url_utils::with_and_without_www(&link.url);
        queued.insert(with_www);
        queued.insert(without_www);
    }
    page_links
        .into_iter()
        .filter(|pl| {
            let (with_www, without_www) = url_utils::with_and_without_www(&pl.url);
            !queued.contains(&with_www) && !queued.contains(&without_www)
        })
        .collect()
}

/// Split off links whose URL exceeds the length cap. Returns
/// (kept, too_long) so the caller can log the discarded ones.
pub fn filter_out_long(page_links: Vec<PageLink>) -> (Vec<PageLink>, Vec<PageLink>) {
    page_links
        .into_iter()
        .partition(|pl| pl.url.len() <= Config::MAX_URL_LEN)
}

/// Stable partition: links whose URL mentions a relevant word move to
/// the front, everything else keeps its relative order behind them.
pub fn prioritize_relevant(links: Vec<PageLink>) -> Vec<PageLink> {
    let (mut front, rest): (Vec<PageLink>, Vec<PageLink>) = links.into_iter().partition(|pl| {
        let lower = pl.url.to_lowercase();
        Config::RELEVANT_WORDS.iter().any(|word| lower.contains(word))
    });
    front.extend(rest);
    front
}
