//! Sitemap seeding for the crawler frontier.
//!
//! Tries `{origin}/sitemap.xml` (or an explicit override), parses `<loc>`
//! entries from a `<urlset>`, and recurses one level into `<sitemapindex>`
//! children. Regex-based parsing on purpose: real sitemaps are frequently
//! not well-formed XML, and a missing sitemap must never fail the crawl.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::fetch::HttpClient;
use crate::utils::normalize_url;

lazy_static! {
    static ref LOC_RE: Regex = Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("static regex");
    static ref SITEMAPINDEX_RE: Regex = Regex::new(r"(?i)<sitemapindex").expect("static regex");
}

/// Maximum child sitemaps followed from an index.
const MAX_CHILD_SITEMAPS: usize = 10;

/// Fetch and parse the sitemap for `origin`, returning normalized URLs.
/// Every failure path returns an empty list.
pub async fn seed_urls(
    http: &HttpClient,
    origin: &str,
    sitemap_override: Option<&str>,
) -> Vec<String> {
    let sitemap_url = sitemap_override
        .map(str::to_string)
        .unwrap_or_else(|| format!("{origin}/sitemap.xml"));

    let body = match fetch_body(http, &sitemap_url).await {
        Some(body) => body,
        None => return Vec::new(),
    };

    if SITEMAPINDEX_RE.is_match(&body) {
        // One level of recursion: the children listed by the index.
        let children: Vec<String> = parse_locs(&body)
            .into_iter()
            .take(MAX_CHILD_SITEMAPS)
            .collect();
        debug!(sitemap = %sitemap_url, children = children.len(), "sitemap index");
        let mut urls = Vec::new();
        for child in children {
            if let Some(child_body) = fetch_body(http, &child).await {
                urls.extend(parse_locs(&child_body));
            }
        }
        normalize_all(urls)
    } else {
        normalize_all(parse_locs(&body))
    }
}

async fn fetch_body(http: &HttpClient, url: &str) -> Option<String> {
    match http.get(url, None).await {
        Ok(response) if !response.body.is_empty() => Some(response.body),
        Ok(_) => None,
        Err(e) => {
            warn!(url, error = %e, "sitemap fetch failed");
            None
        }
    }
}

fn parse_locs(body: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
        .collect()
}

fn normalize_all(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .filter_map(|u| normalize_url(&u).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset_locs() {
        let body = r"<?xml version='1.0'?><urlset>
            <url><loc>https://example.com/a</loc></url>
            <url><loc> https://example.com/b?z=1&amp;a=2 </loc></url>
        </urlset>";
        let locs = parse_locs(body);
        assert_eq!(locs.len(), 2);
        assert_eq!(locs[1], "https://example.com/b?z=1&a=2");
    }

    #[test]
    fn detects_sitemap_index() {
        assert!(SITEMAPINDEX_RE.is_match("<sitemapindex xmlns=\"x\">"));
        assert!(!SITEMAPINDEX_RE.is_match("<urlset>"));
    }
}
