//! Streaming detection of the page that profile pages link out from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::format;
use crate::links::PageLink;

/// A detected origin page, with everything the driver needs to pivot
/// the crawl onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMatch {
    /// URL of the page the profile cluster hangs off.
    pub origin: String,
    /// Depth of the origin page itself, one hop above its children.
    pub depth: u32,
    /// Mined common URL format of the children, when one exists.
    pub format: Option<String>,
}

/// Groups profile-classified pages by the page that linked to them and
/// fires once any single parent accumulates enough distinct children.
#[derive(Debug, Default)]
pub struct OriginDetector {
    candidates: HashMap<String, Vec<String>>,
    result: Option<OriginMatch>,
}

impl OriginDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a page that the classifier marked as a profile. Returns
    /// the match when this observation is the one crossing the
    /// threshold; the driver reads later state via [`Self::result`].
    pub fn observe(&mut self, link: &PageLink) -> Option<&OriginMatch> {
        if self.result.is_some() {
            return self.result.as_ref();
        }

        let origin = link.origin_url().to_string();
        let children = self.candidates.entry(origin.clone()).or_default();
        // revisits of a self-attributed page must not inflate the count
        if children.iter().any(|c| c == &link.url) {
            return None;
        }
        children.push(link.url.clone());

        if children.len() == Config::ORIGIN_PAGE_THRESHOLD {
            self.result = Some(OriginMatch {
                origin,
                depth: link.depth.saturating_sub(1),
                format: format::most_common_format(children, Config::PLACEHOLDER),
            });
            return self.result.as_ref();
        }
        None
    }

    pub fn successful(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&OriginMatch> {
        self.result.as_ref()
    }

    /// Forget everything, ready to hunt for the next origin page.
    pub fn reset(&mut self) {
        self.candidates.clear();
        self.result = None;
    }
}
