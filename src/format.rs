//! URL template mining: turn a cluster of profile-page URLs into the
//! common format they share, and match further URLs against it.

use regex::Regex;

/// Replace every query parameter value with the placeholder while
/// keeping the parameter names: `?id=123&page=cv` -> `?id=####&page=####`.
pub fn mask_query_values(url: &str, placeholder: &str) -> String {
    let Some(query_at) = url.find('?') else {
        return url.to_string();
    };
    let (path, query) = url.split_at(query_at);
    let mut masked = String::with_capacity(url.len());
    masked.push_str(path);
    masked.push('?');
    for (i, pair) in query[1..].split('&').enumerate() {
        if i > 0 {
            masked.push('&');
        }
        match pair.split_once('=') {
            Some((key, _)) => {
                masked.push_str(key);
                masked.push('=');
                masked.push_str(placeholder);
            }
            None => masked.push_str(pair),
        }
    }
    masked
}

fn scheme_and_host(url: &str) -> String {
    let scheme = if url.starts_with("https://") { "https" } else { "http" };
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let host = rest.split('/').next().unwrap_or(rest);
    format!("{scheme}://{host}/")
}

fn relative_part(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split_once('/').map(|(_, r)| r).unwrap_or("")
}

/// Whether every path segment of a template (before any query) is just
/// the placeholder. Such templates match nearly anything and are only
/// acceptable when nothing better exists.
fn is_degenerate(template: &str, placeholder: &str) -> bool {
    let path = template.split('?').next().unwrap_or(template);
    path.split('/').all(|segment| segment == placeholder)
}

/// Mine the most common URL format from a set of URLs.
///
/// Query values are masked first, then every ordered pair of relative
/// parts is diffed segment by segment, differing segments becoming the
/// placeholder. The template seen for the most pairs wins; templates
/// made of nothing but placeholders lose to any concrete one, and ties
/// prefer fewer placeholders.
///
/// Returns `None` for an empty input. A single URL, or a set of
/// identical ones, is returned verbatim.
pub fn most_common_format(urls: &[String], placeholder: &str) -> Option<String> {
    let first = urls.first()?;
    if urls.len() == 1 || urls.iter().all(|u| u == first) {
        return Some(first.clone());
    }

    let base_url = scheme_and_host(first);
    let rels: Vec<Vec<String>> = urls
        .iter()
        .map(|url| {
            let masked = mask_query_values(url, placeholder);
            relative_part(&masked)
                .split('/')
                .map(str::to_string)
                .collect()
        })
        .collect();

    // first-seen order is kept so that sorting below stays deterministic
    let mut templates: Vec<(String, usize)> = Vec::new();
    for a in &rels {
        for b in &rels {
            let shorter = a.len().min(b.len());
            let longer = a.len().max(b.len());
            let mut parts: Vec<&str> = Vec::with_capacity(longer);
            for i in 0..shorter {
                parts.push(if a[i] == b[i] { &a[i] } else { placeholder });
            }
            parts.resize(longer, placeholder);
            let template = parts.join("/");
            if !template.contains(placeholder) {
                continue;
            }
            match templates.iter_mut().find(|(t, _)| *t == template) {
                Some((_, count)) => *count += 1,
                None => templates.push((template, 1)),
            }
        }
    }

    if templates.is_empty() {
        return Some(first.clone());
    }
    templates.sort_by_key(|(template, count)| {
        (
            is_degenerate(template, placeholder),
            std::cmp::Reverse(*count),
            template.matches(placeholder).count(),
        )
    });
    Some(format!("{base_url}{}", templates[0].0))
}

/// Compiled matcher for a mined URL format.
#[derive(Debug, Clone)]
pub enum FormatMatcher {
    /// Template with placeholders, matched as a regex search.
    Pattern(Regex),
    /// Template without placeholders only matches itself.
    Exact(String),
}

impl FormatMatcher {
    pub fn new(format: &str, placeholder: &str) -> Result<Self, regex::Error> {
        if !format.contains(placeholder) {
            return Ok(Self::Exact(format.to_string()));
        }
        let pattern = regex::escape(format).replace(&regex::escape(placeholder), ".+?");
        Ok(Self::Pattern(Regex::new(&pattern)?))
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(url),
            Self::Exact(exact) => url == exact,
        }
    }
}
