//! Core types for crawl operations: options, pages, results, and events.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::utils::constants::{DEFAULT_MAX_DEPTH, MAX_CRAWL_DEPTH};

/// Frontier pop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStrategy {
    Bfs,
    Dfs,
}

/// Options for one crawl. Depth is capped at `MAX_CRAWL_DEPTH` regardless
/// of what the caller asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlOptions {
    pub max_depth: u32,
    pub max_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,
    pub respect_robots: bool,
    pub render_js: bool,
    pub extract_content: bool,
    pub concurrency: usize,
    pub strategy: CrawlStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap_url: Option<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_pages: 50,
            path_prefix: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            respect_robots: true,
            render_js: false,
            extract_content: false,
            concurrency: 4,
            strategy: CrawlStrategy::Bfs,
            sitemap_url: None,
        }
    }
}

impl CrawlOptions {
    /// Clamp out-of-range knobs instead of failing the crawl.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.max_depth = self.max_depth.min(MAX_CRAWL_DEPTH);
        self.max_pages = self.max_pages.max(1);
        self.concurrency = self.concurrency.clamp(1, 64);
        self
    }
}

/// Outcome recorded for one crawled URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Success,
    Error,
    Skipped,
    RobotsBlocked,
}

/// One page in the crawl result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlPage {
    /// Normalized URL.
    pub url: String,
    pub depth: u32,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_token_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fetch_duration_ms: u64,
}

/// Terminal (or in-flight) state of a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Running,
    Completed,
    Cancelled,
    Error,
}

/// Aggregates over the crawled pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStats {
    pub total_pages: usize,
    pub success_pages: usize,
    pub error_pages: usize,
    pub skipped_pages: usize,
    pub total_tokens: usize,
    pub total_raw_tokens: usize,
    pub token_savings_percent: i64,
    pub total_duration_ms: u64,
    pub unique_domains: usize,
}

/// Result of a whole crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub start_url: String,
    pub options: CrawlOptions,
    pub status: CrawlStatus,
    pub pages: Vec<CrawlPage>,
    pub stats: CrawlStats,
}

/// Listener events emitted while a crawl runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    #[serde(rename = "page:fetched")]
    PageFetched { url: String, depth: u32, http_status: u16 },
    #[serde(rename = "page:extracted")]
    PageExtracted { url: String, token_count: usize },
    #[serde(rename = "page:error")]
    PageError { url: String, error: String },
    #[serde(rename = "crawl:complete")]
    CrawlComplete { status: CrawlStatus, total_pages: usize },
}

/// Cancellation handle for a running crawl. Cloneable; `cancel` is
/// idempotent.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// The crawl engine's side of the cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a linked cancel handle/signal pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_caps_depth_and_floors_pages() {
        let options = CrawlOptions {
            max_depth: 99,
            max_pages: 0,
            concurrency: 500,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(options.max_depth, MAX_CRAWL_DEPTH);
        assert_eq!(options.max_pages, 1);
        assert_eq!(options.concurrency, 64);
    }

    #[test]
    fn cancel_pair_links() {
        let (handle, signal) = cancel_pair();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
    }
}
