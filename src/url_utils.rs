//! URL utilities for consistent crawling behavior across modules.

use url::Url;

use crate::config::Config;

pub fn extract_host(url: &str) -> Option<String> {
    let parsed = if url.starts_with("http://") || url.starts_with("https://") {
        Url::parse(url).ok()?
    } else {
        Url::parse(&format!("http://{url}")).ok()?
    };
    parsed.host_str().map(|s| s.to_string())
}

fn root_domain(hostname: &str) -> String {
    let parts: Vec<&str> = hostname.split('.').collect();
    if parts.len() >= 2 {
        format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1])
    } else {
        hostname.to_string()
    }
}

/// Extract registrable domain (eTLD+1) using Public Suffix List.
/// Handles multi-label TLDs: www.example.co.uk -> example.co.uk
pub fn registrable_domain(hostname: &str) -> String {
    match psl::domain(hostname.as_bytes()) {
        Some(domain) => String::from_utf8_lossy(domain.as_bytes()).to_string(),
        None => root_domain(hostname), // Fallback for localhost, IPs
    }
}

/// The subdomain labels in front of the registrable domain, with any
/// leading "www" folded away. `www.people.example.com` -> `people`.
pub fn subdomain_of(hostname: &str) -> String {
    let registrable = registrable_domain(hostname);
    let sub = hostname
        .strip_suffix(&registrable)
        .map(|s| s.trim_end_matches('.'))
        .unwrap_or("");
    let sub = sub.strip_prefix("www.").unwrap_or(sub);
    if sub == "www" {
        String::new()
    } else {
        sub.to_string()
    }
}

/// Whether a link's host belongs to the crawled site. The registrable
/// domains must match and the link's subdomain must be the base's or a
/// dot-separated child of it (after folding "www").
pub fn is_same_site(link_host: &str, base_host: &str) -> bool {
    if registrable_domain(link_host) != registrable_domain(base_host) {
        return false;
    }
    let link_sub = subdomain_of(link_host);
    let base_sub = subdomain_of(base_host);
    base_sub.is_empty() || link_sub == base_sub || link_sub.ends_with(&format!(".{base_sub}"))
}

/// Checks whether a link is worth queueing at all: non-navigational
/// schemes, cache busters, denylisted file extensions and off-site
/// absolute URLs are all rejected.
pub fn is_valid(url: &str, base_url: &str) -> bool {
    if url.is_empty() || url == "." || url.ends_with('#') {
        return false;
    }

    if url.starts_with("mailto:") || url.starts_with("tel:") || url.starts_with("javascript:") {
        return false;
    }

    if url.contains("?nocache") {
        return false;
    }

    if let Some(ext) = final_segment_extension(url) {
        if Config::INVALID_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return false;
        }
    }

    // relative links are judged after absolutization; only links that
    // already carry a scheme can be rejected as off-site here
    let has_scheme = url.starts_with("http://") || url.starts_with("https://");
    if has_scheme {
        match (extract_host(url), extract_host(base_url)) {
            (Some(link_host), Some(base_host)) => {
                if !is_same_site(&link_host, &base_host) {
                    return false;
                }
            }
            _ => return false,
        }
    }

    true
}

/// File extension of the last path segment, if the segment has one.
/// Works on raw link strings, before absolutization.
fn final_segment_extension(url: &str) -> Option<&str> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// Turn a raw href into an absolute URL. Scheme-qualified links pass
/// through, `www.`-links gain a scheme, `/`-rooted paths resolve against
/// the site root and everything else resolves against the current page.
pub fn to_absolute(link: &str, base_url: &str, current_url: &str) -> String {
    if link.starts_with("http") {
        return link.to_string();
    }
    if link.starts_with("www") {
        return format!("http://{link}");
    }
    if let Some(rooted) = link.strip_prefix('/') {
        if base_url.ends_with('/') {
            return format!("{base_url}{rooted}");
        }
        return format!("{base_url}/{rooted}");
    }
    if current_url.ends_with('/') {
        format!("{current_url}{link}")
    } else {
        format!("{current_url}/{link}")
    }
}

/// Both spellings of a URL: with and without the leading "www".
/// Returned as (with_www, without_www) regardless of the input form.
pub fn with_and_without_www(url: &str) -> (String, String) {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, url),
    };
    let bare = rest.strip_prefix("www.").unwrap_or(rest);
    let (with, without) = (format!("www.{bare}"), bare.to_string());
    match scheme {
        Some(scheme) => (format!("{scheme}://{with}"), format!("{scheme}://{without}")),
        None => (with, without),
    }
}

/// Fully qualified domain name of a URL's host.
pub fn to_fqdn(url: &str) -> String {
    extract_host(url).unwrap_or_default()
}

/// Reduce a URL to `scheme://fqdn/`. Used as the crawl root unless the
/// caller asks to preserve the seed URI as given.
pub fn to_base_url(url: &str) -> String {
    let scheme = if url.contains("https://") { "https" } else { "http" };
    format!("{}://{}/", scheme, to_fqdn(url))
}

/// Short site key used to name per-site export directories:
/// the bare domain label, suffixed with the subdomain when one exists.
pub fn to_key(url: &str) -> String {
    let host = to_fqdn(url);
    let registrable = registrable_domain(&host);
    let label = registrable
        .split_once('.')
        .map(|(label, _)| label)
        .unwrap_or(&registrable);
    let sub = subdomain_of(&host);
    if sub.is_empty() {
        label.to_string()
    } else {
        format!("{label}-{sub}")
    }
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.starts_with("text/html") || lower.starts_with("application/xhtml+xml")
}

pub fn is_plain_text_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().starts_with("text/")
}
