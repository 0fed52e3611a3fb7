//! The fetch pipeline: validate → rate-limit → cache → fetch → store.
//!
//! `Fetcher` is the one entry point for retrieving page bytes. It owns the
//! SSRF validator, rate limiter, content cache, HTTP client, and the
//! optional renderer seam, and guarantees their ordering: no socket opens
//! before validation passes, no request goes out before the domain bucket
//! admits it, and every successful fetch lands in the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{SiftError, SiftResult};
use crate::fetch::cache::{CacheEntry, CacheLookup, ContentCache, FetchMode};
use crate::fetch::http_client::{ConditionalHeaders, HttpClient};
use crate::fetch::rate_limiter::RateLimiter;
use crate::fetch::render::PageRenderer;
use crate::fetch::robots::RobotsManager;
use crate::utils::normalize_url;

/// A fetched page plus provenance the pipelines need.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub body: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub final_url: String,
    pub protocol: String,
    pub duration_ms: u64,
    pub from_cache: bool,
    pub rendered: bool,
    pub render_diagnostics: HashMap<String, serde_json::Value>,
}

/// Owns the fetch-side collaborators and runs the pipeline.
pub struct Fetcher {
    http: HttpClient,
    rate_limiter: RateLimiter,
    cache: ContentCache,
    robots: RobotsManager,
    renderer: Option<Arc<dyn PageRenderer>>,
    render_timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &ServiceConfig) -> SiftResult<Self> {
        let http = HttpClient::new(config)?;
        let robots = RobotsManager::new(config, http.raw());
        Ok(Self {
            http,
            rate_limiter: RateLimiter::new(config),
            cache: ContentCache::new(config),
            robots,
            renderer: None,
            render_timeout: config.render_timeout(),
        })
    }

    /// Attach a headless-browser collaborator for rendered mode.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the content cache (e.g. to attach a shared backend).
    #[must_use]
    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    #[must_use]
    pub fn robots(&self) -> &RobotsManager {
        &self.robots
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Fetch a page through the full pipeline.
    ///
    /// Cache behavior: a fresh entry is served directly; a stale entry with
    /// validators triggers a conditional re-request, where a 304 refreshes
    /// the entry and serves the cached body. Rendered mode bypasses
    /// conditional logic (browsers do not replay validators) but still
    /// caches under its own mode key.
    pub async fn fetch(&self, url: &str, mode: FetchMode) -> SiftResult<FetchOutcome> {
        let normalized = normalize_url(url)?;

        // Validation runs before anything touches the network on this URL's
        // behalf, the robots probe included.
        self.http.validate(&normalized).await?;

        // Propagate any robots crawl-delay into the domain bucket before we
        // queue on it.
        if let Ok(Some(delay)) = self.robots.crawl_delay(&normalized).await
            && let Ok(host) = crate::utils::host_of(&normalized)
        {
            self.rate_limiter.set_domain_limit(&host, delay).await;
        }

        // Admission comes before the cache lookup: a cached URL still pays
        // a token, so hammering a hot entry cannot sidestep the per-domain
        // pacing.
        self.rate_limiter.check_limit(&normalized).await?;

        let conditional = match self.cache.get(mode, &normalized).await {
            CacheLookup::Fresh(entry) => {
                debug!(url = %normalized, %mode, "cache hit");
                return Ok(outcome_from_entry(entry, true));
            }
            CacheLookup::Stale(entry) if entry.has_validators() && mode == FetchMode::Http => {
                Some(entry)
            }
            _ => None,
        };

        match mode {
            FetchMode::Http => self.fetch_http(&normalized, conditional).await,
            FetchMode::Rendered => self.fetch_rendered(&normalized).await,
        }
    }

    async fn fetch_http(
        &self,
        normalized: &str,
        stale: Option<CacheEntry>,
    ) -> SiftResult<FetchOutcome> {
        let validators = stale.as_ref().map(|entry| ConditionalHeaders {
            etag: entry.etag.clone(),
            last_modified: entry.last_modified.clone(),
        });

        let response = self.http.get(normalized, validators.as_ref()).await?;

        if response.was_not_modified {
            if let Some(entry) = stale {
                debug!(url = %normalized, "revalidated via 304");
                self.cache
                    .refresh(FetchMode::Http, normalized, entry.clone())
                    .await;
                let mut refreshed = entry;
                refreshed.touch();
                return Ok(outcome_from_entry(refreshed, true));
            }
            // A 304 without a stale entry means validators leaked in from
            // elsewhere; treat as an empty-body success.
            warn!(url = %normalized, "304 without cached entry");
        }

        let entry = CacheEntry {
            body: response.body.clone(),
            status: response.status,
            headers: response.headers.clone(),
            final_url: response.final_url.clone(),
            protocol: response.protocol.clone(),
            fetched_at: Utc::now(),
            etag: response.etag.clone(),
            last_modified: response.last_modified.clone(),
        };
        self.cache.put(FetchMode::Http, normalized, entry).await;

        Ok(FetchOutcome {
            body: response.body,
            status: response.status,
            headers: response.headers,
            final_url: response.final_url,
            protocol: response.protocol,
            duration_ms: response.duration_ms,
            from_cache: false,
            rendered: false,
            render_diagnostics: HashMap::new(),
        })
    }

    async fn fetch_rendered(&self, normalized: &str) -> SiftResult<FetchOutcome> {
        let Some(renderer) = &self.renderer else {
            debug!(url = %normalized, "no renderer configured, falling back to http");
            return self.fetch_http(normalized, None).await;
        };

        let started = std::time::Instant::now();
        let rendered = tokio::time::timeout(self.render_timeout, renderer.render(normalized))
            .await
            .map_err(|_| SiftError::Timeout {
                url: normalized.to_string(),
                timeout_ms: self.render_timeout.as_millis() as u64,
            })?
            .map_err(|e| SiftError::Network {
                url: normalized.to_string(),
                reason: format!("renderer failed: {e}"),
            })?;

        let entry = CacheEntry {
            body: rendered.html.clone(),
            status: rendered.status,
            headers: HashMap::new(),
            final_url: rendered.final_url.clone(),
            protocol: "rendered".to_string(),
            fetched_at: Utc::now(),
            etag: None,
            last_modified: None,
        };
        self.cache.put(FetchMode::Rendered, normalized, entry).await;

        Ok(FetchOutcome {
            body: rendered.html,
            status: rendered.status,
            headers: HashMap::new(),
            final_url: rendered.final_url,
            protocol: "rendered".to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            from_cache: false,
            rendered: true,
            render_diagnostics: rendered.diagnostics,
        })
    }
}

fn outcome_from_entry(entry: CacheEntry, from_cache: bool) -> FetchOutcome {
    FetchOutcome {
        body: entry.body,
        status: entry.status,
        headers: entry.headers,
        final_url: entry.final_url,
        protocol: entry.protocol,
        duration_ms: 0,
        from_cache,
        rendered: false,
        render_diagnostics: HashMap::new(),
    }
}
