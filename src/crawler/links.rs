//! Link extraction and frontier filtering.
//!
//! Extraction is regex-based and tolerant: double-quoted, single-quoted,
//! and unquoted href values all match, because crawled HTML is rarely
//! well-formed enough for strict parsing. Extracted links are resolved
//! against the page's final URL, normalized, and passed through the filter
//! chain: same host required, then optional path prefix, include patterns
//! (at least one must match), and exclude patterns (none may match).
//! Malformed filter regexes silently reject.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::utils::{host_of, resolve_and_normalize};

lazy_static! {
    /// href="..." | href='...' | href=bare
    static ref HREF_RE: Regex = Regex::new(
        r#"(?i)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#
    )
    .expect("static regex");

    static ref TITLE_RE: Regex =
        Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex");
}

/// Schemes and pseudo-links the crawler never follows.
fn is_followable(href: &str) -> bool {
    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();
    !(lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:"))
}

/// Extract raw href values from HTML in document order.
#[must_use]
pub fn extract_hrefs(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        })
        .filter(|href| is_followable(href))
        .collect()
}

/// Extract, resolve, and normalize links against the page's final URL.
/// Unresolvable hrefs are dropped.
#[must_use]
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let mut links = Vec::new();
    for href in extract_hrefs(html) {
        match resolve_and_normalize(base_url, &href) {
            Ok(normalized) => links.push(normalized),
            Err(_) => trace!(href, "dropping unresolvable href"),
        }
    }
    links
}

/// Raw `<title>` text, used when content extraction is off.
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| crate::utils::clean_fragment(m.as_str()))
        .filter(|t| !t.is_empty())
}

/// Compiled frontier filter. Pattern compilation failures are dropped at
/// construction; a link whose include list compiled to nothing (while
/// patterns were configured) is rejected, matching the "malformed regexes
/// silently reject" rule.
#[derive(Debug)]
pub struct LinkFilter {
    host: String,
    path_prefix: Option<String>,
    include: Vec<Regex>,
    include_configured: bool,
    exclude: Vec<Regex>,
}

impl LinkFilter {
    /// Build a filter rooted at the crawl's start URL.
    pub fn new(
        start_url: &str,
        path_prefix: Option<&str>,
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> crate::error::SiftResult<Self> {
        let host = host_of(start_url)?;
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns
                .iter()
                .filter_map(|p| match Regex::new(p) {
                    Ok(re) => Some(re),
                    Err(_) => {
                        trace!(pattern = %p, "malformed filter pattern ignored");
                        None
                    }
                })
                .collect()
        };
        Ok(Self {
            host,
            path_prefix: path_prefix.map(str::to_string),
            include: compile(include_patterns),
            include_configured: !include_patterns.is_empty(),
            exclude: compile(exclude_patterns),
        })
    }

    /// Whether a normalized link belongs in the frontier.
    #[must_use]
    pub fn accepts(&self, normalized_url: &str) -> bool {
        let Ok(host) = host_of(normalized_url) else {
            return false;
        };
        if host != self.host {
            return false;
        }
        if let Some(prefix) = &self.path_prefix {
            let path = url::Url::parse(normalized_url)
                .map(|u| u.path().to_string())
                .unwrap_or_default();
            if !path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if self.include_configured && !self.include.iter().any(|re| re.is_match(normalized_url)) {
            return false;
        }
        if self.exclude.iter().any(|re| re.is_match(normalized_url)) {
            return false;
        }
        true
    }
}
