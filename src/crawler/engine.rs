//! Crawl orchestration: frontier, dedup, concurrency, cancellation.
//!
//! The main loop fills a `FuturesUnordered` up to the concurrency limit,
//! awaits one completion, records the page, and feeds newly discovered
//! links back into the frontier. BFS pops the front of the queue, DFS the
//! back. Dedup happens twice: normalized URLs in `visited` stop refetches,
//! content fingerprints in `seen` stop near-duplicate pages from spawning
//! more links.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashSet;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::distill::{Distiller, canonicalize, sha256_hex};
use crate::error::{SiftError, SiftResult};
use crate::fetch::{FetchMode, Fetcher};
use crate::utils::{estimate_tokens, host_of, normalize_url, origin_of};

use super::links::{LinkFilter, extract_links, extract_title};
use super::sitemap;
use super::types::{
    CancelSignal, CrawlEvent, CrawlOptions, CrawlPage, CrawlResult, CrawlStats, CrawlStatus,
    CrawlStrategy, PageStatus,
};

/// Event channel capacity; slow subscribers lose oldest events.
const EVENT_CAPACITY: usize = 256;

struct PageOutcome {
    page: CrawlPage,
    /// Filtered, normalized links to enqueue at `depth + 1`.
    links: Vec<String>,
}

/// Link-following crawler over the fetch pipeline.
pub struct Crawler {
    fetcher: Arc<Fetcher>,
    distiller: Arc<Distiller>,
    events: broadcast::Sender<CrawlEvent>,
}

impl Crawler {
    #[must_use]
    pub fn new(_config: &ServiceConfig, fetcher: Arc<Fetcher>, distiller: Arc<Distiller>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            fetcher,
            distiller,
            events,
        }
    }

    /// Subscribe to `page:*` / `crawl:complete` events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.events.subscribe()
    }

    /// Crawl from `start_url` under the given options.
    ///
    /// # Errors
    ///
    /// Only start-URL validation fails the call; per-page failures are
    /// recorded on their pages.
    pub async fn crawl(
        &self,
        start_url: &str,
        options: CrawlOptions,
        cancel: Option<CancelSignal>,
    ) -> SiftResult<CrawlResult> {
        let options = options.sanitized();
        let start = normalize_url(start_url)?;
        let started = Instant::now();

        let filter = Arc::new(LinkFilter::new(
            &start,
            options.path_prefix.as_deref(),
            &options.include_patterns,
            &options.exclude_patterns,
        )?);

        let visited: Arc<DashSet<String>> = Arc::new(DashSet::new());
        let seen_hashes: Arc<DashSet<String>> = Arc::new(DashSet::new());
        let queue: Arc<Mutex<VecDeque<(String, u32)>>> = Arc::new(Mutex::new(VecDeque::new()));
        let launched = Arc::new(AtomicUsize::new(0));

        // The start URL is always first at depth 0; sitemap URLs follow at
        // depth 1.
        queue.lock().await.push_back((start.clone(), 0));
        self.seed_from_sitemap(&start, &options, &filter, &queue)
            .await;

        let semaphore = Arc::new(Semaphore::new(options.concurrency));
        let mut active: FuturesUnordered<tokio::task::JoinHandle<PageOutcome>> =
            FuturesUnordered::new();
        let mut pages: Vec<CrawlPage> = Vec::new();
        let mut was_cancelled = false;

        loop {
            let cancelled_now = cancel.as_ref().is_some_and(CancelSignal::is_cancelled);
            if cancelled_now {
                was_cancelled = true;
            }

            // Fill up to the concurrency limit. Cancellation and the page
            // budget both gate new launches, never in-flight work.
            while !cancelled_now && active.len() < options.concurrency {
                if launched.load(Ordering::Relaxed) >= options.max_pages {
                    break;
                }
                let item = {
                    let mut q = queue.lock().await;
                    match options.strategy {
                        CrawlStrategy::Bfs => q.pop_front(),
                        CrawlStrategy::Dfs => q.pop_back(),
                    }
                };
                let Some((url, depth)) = item else { break };

                if !visited.insert(url.clone()) {
                    continue;
                }
                launched.fetch_add(1, Ordering::Relaxed);

                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let fetcher = Arc::clone(&self.fetcher);
                let distiller = Arc::clone(&self.distiller);
                let filter = Arc::clone(&filter);
                let seen_hashes = Arc::clone(&seen_hashes);
                let events = self.events.clone();
                let options = options.clone();

                active.push(tokio::spawn(async move {
                    let _permit = permit;
                    process_page(
                        &fetcher,
                        &distiller,
                        &filter,
                        &seen_hashes,
                        &events,
                        &options,
                        url,
                        depth,
                    )
                    .await
                }));
            }

            match active.next().await {
                Some(Ok(outcome)) => {
                    if outcome.page.depth < options.max_depth && !was_cancelled {
                        let mut q = queue.lock().await;
                        for link in &outcome.links {
                            if !visited.contains(link) {
                                q.push_back((link.clone(), outcome.page.depth + 1));
                            }
                        }
                    }
                    pages.push(outcome.page);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "crawl task panicked");
                }
                None => {
                    // Nothing in flight; if the frontier is also empty (or
                    // we are cancelled / at budget) the crawl is done.
                    let drained = queue.lock().await.is_empty();
                    if drained
                        || was_cancelled
                        || launched.load(Ordering::Relaxed) >= options.max_pages
                    {
                        break;
                    }
                }
            }

            if pages.len() >= options.max_pages {
                break;
            }
        }

        // Let in-flight fetches complete even on cancellation.
        while let Some(result) = active.next().await {
            if let Ok(outcome) = result {
                pages.push(outcome.page);
            }
        }

        let status = if was_cancelled {
            CrawlStatus::Cancelled
        } else {
            CrawlStatus::Completed
        };
        let stats = compute_stats(&pages, started.elapsed().as_millis() as u64);
        info!(
            start = %start,
            pages = pages.len(),
            ?status,
            duration_ms = stats.total_duration_ms,
            "crawl finished"
        );

        let _ = self.events.send(CrawlEvent::CrawlComplete {
            status,
            total_pages: pages.len(),
        });

        Ok(CrawlResult {
            start_url: start,
            options,
            status,
            pages,
            stats,
        })
    }

    async fn seed_from_sitemap(
        &self,
        start: &str,
        options: &CrawlOptions,
        filter: &LinkFilter,
        queue: &Mutex<VecDeque<(String, u32)>>,
    ) {
        let Ok(origin) = origin_of(start) else {
            return;
        };
        let urls =
            sitemap::seed_urls(self.fetcher.http(), &origin, options.sitemap_url.as_deref()).await;
        if urls.is_empty() {
            return;
        }
        let mut q = queue.lock().await;
        let mut seeded = 0usize;
        for url in urls {
            if url != start && filter.accepts(&url) {
                q.push_back((url, 1));
                seeded += 1;
            }
        }
        debug!(origin, seeded, "sitemap URLs queued");
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_page(
    fetcher: &Fetcher,
    distiller: &Distiller,
    filter: &LinkFilter,
    seen_hashes: &DashSet<String>,
    events: &broadcast::Sender<CrawlEvent>,
    options: &CrawlOptions,
    url: String,
    depth: u32,
) -> PageOutcome {
    let started = Instant::now();

    let mut page = CrawlPage {
        url: url.clone(),
        depth,
        status: PageStatus::Error,
        http_status: None,
        title: None,
        content: None,
        links: Vec::new(),
        token_count: None,
        raw_token_count: None,
        error: None,
        fetch_duration_ms: 0,
    };

    if options.respect_robots {
        match fetcher.robots().is_allowed(&url).await {
            Ok(false) => {
                page.status = PageStatus::RobotsBlocked;
                page.error = Some("robots.txt disallow".to_string());
                page.fetch_duration_ms = started.elapsed().as_millis() as u64;
                let _ = events.send(CrawlEvent::PageError {
                    url,
                    error: "robots.txt disallow".to_string(),
                });
                return PageOutcome {
                    page,
                    links: Vec::new(),
                };
            }
            Ok(true) => {}
            Err(e) => {
                // Robots trouble is never fatal to the page.
                debug!(url = %url, error = %e, "robots check failed, proceeding");
            }
        }
    }

    let mode = if options.render_js {
        FetchMode::Rendered
    } else {
        FetchMode::Http
    };

    let outcome = match fetcher.fetch(&url, mode).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = match &e {
                SiftError::HttpStatus { status, .. } => {
                    page.http_status = Some(*status);
                    format!("HTTP {status}")
                }
                other => other.to_string(),
            };
            page.error = Some(message.clone());
            page.fetch_duration_ms = started.elapsed().as_millis() as u64;
            let _ = events.send(CrawlEvent::PageError {
                url,
                error: message,
            });
            return PageOutcome {
                page,
                links: Vec::new(),
            };
        }
    };

    page.http_status = Some(outcome.status);
    page.fetch_duration_ms = started.elapsed().as_millis() as u64;
    page.raw_token_count = Some(estimate_tokens(&outcome.body));

    // Content-hash dedup: a body we have seen under another URL is recorded
    // but contributes no links. Hashed over the canonical form so that
    // whitespace or tag-case noise cannot defeat it.
    let body_hash = sha256_hex(canonicalize(&outcome.body).as_bytes());
    if !seen_hashes.insert(body_hash) {
        debug!(url = %url, "duplicate content, skipping");
        page.status = PageStatus::Skipped;
        return PageOutcome {
            page,
            links: Vec::new(),
        };
    }

    let _ = events.send(CrawlEvent::PageFetched {
        url: url.clone(),
        depth,
        http_status: outcome.status,
    });

    let raw_links = extract_links(&outcome.body, &outcome.final_url);
    let links: Vec<String> = raw_links
        .into_iter()
        .filter(|link| filter.accepts(link))
        .collect();
    page.links = links.clone();

    if options.extract_content {
        let doc = distiller.distill(&outcome.body, &outcome.final_url, None).await;
        let tokens = estimate_tokens(&doc.content_text);
        page.token_count = Some(tokens);
        page.title = (!doc.title.is_empty()).then(|| doc.title.clone());
        page.content = Some(doc.content_text);
        let _ = events.send(CrawlEvent::PageExtracted {
            url: url.clone(),
            token_count: tokens,
        });
    } else {
        page.title = extract_title(&outcome.body);
    }

    page.status = if (200..400).contains(&outcome.status) {
        PageStatus::Success
    } else {
        page.error = Some(format!("HTTP {}", outcome.status));
        PageStatus::Error
    };

    PageOutcome { page, links }
}

fn compute_stats(pages: &[CrawlPage], total_duration_ms: u64) -> CrawlStats {
    let total_tokens: usize = pages.iter().filter_map(|p| p.token_count).sum();
    let total_raw_tokens: usize = pages.iter().filter_map(|p| p.raw_token_count).sum();
    let token_savings_percent = if total_raw_tokens > 0 && total_tokens > 0 {
        (((total_raw_tokens as f64 - total_tokens as f64) / total_raw_tokens as f64) * 100.0)
            .round() as i64
    } else {
        0
    };
    let unique_domains = pages
        .iter()
        .filter_map(|p| host_of(&p.url).ok())
        .collect::<std::collections::HashSet<_>>()
        .len();

    CrawlStats {
        total_pages: pages.len(),
        success_pages: pages
            .iter()
            .filter(|p| p.status == PageStatus::Success)
            .count(),
        error_pages: pages
            .iter()
            .filter(|p| matches!(p.status, PageStatus::Error | PageStatus::RobotsBlocked))
            .count(),
        skipped_pages: pages
            .iter()
            .filter(|p| p.status == PageStatus::Skipped)
            .count(),
        total_tokens,
        total_raw_tokens,
        token_savings_percent,
        total_duration_ms,
        unique_domains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_aggregate_counts_and_savings() {
        let page = |status, tokens, raw| CrawlPage {
            url: "https://example.com/a".to_string(),
            depth: 0,
            status,
            http_status: Some(200),
            title: None,
            content: None,
            links: Vec::new(),
            token_count: tokens,
            raw_token_count: raw,
            error: None,
            fetch_duration_ms: 5,
        };
        let pages = vec![
            page(PageStatus::Success, Some(100), Some(400)),
            page(PageStatus::Skipped, None, Some(400)),
            page(PageStatus::Error, None, None),
        ];
        let stats = compute_stats(&pages, 42);
        assert_eq!(stats.total_pages, 3);
        assert_eq!(stats.success_pages, 1);
        assert_eq!(stats.skipped_pages, 1);
        assert_eq!(stats.error_pages, 1);
        assert_eq!(stats.total_tokens, 100);
        assert_eq!(stats.total_raw_tokens, 800);
        assert_eq!(stats.token_savings_percent, 88);
        assert_eq!(stats.unique_domains, 1);
    }
}
