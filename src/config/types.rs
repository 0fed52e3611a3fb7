//! Core configuration types for the extraction service.
//!
//! One `ServiceConfig` is built at startup and threaded down into every
//! subsystem. There is no global state: the fetch pipeline, distiller,
//! crawler, and job queue each borrow the knobs they need from here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_BUCKET_CAPACITY, DEFAULT_CACHE_TTL_SECS, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_MAX_NODES,
    DEFAULT_REFILL_RPS, DEFAULT_RENDER_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_ROBOTS_TTL_SECS, DEFAULT_TERMINAL_RETENTION, DEFAULT_USER_AGENT,
    DEFAULT_WAITER_TICK_MS, DEFAULT_WORKER_TICK_MS,
};

/// Main configuration for the extraction service core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// User-Agent sent on every outbound request, including robots fetches.
    pub(crate) user_agent: String,

    /// Per-request timeout for plain HTTP fetches.
    pub(crate) request_timeout: Duration,

    /// Rendered fetches carry a longer ceiling.
    pub(crate) render_timeout: Duration,

    /// Maximum retry attempts for transport errors and 5xx responses.
    pub(crate) max_retries: u32,

    /// Base delay for exponential retry backoff.
    pub(crate) retry_base_delay: Duration,

    /// Response bodies larger than this are rejected.
    pub(crate) max_body_bytes: usize,

    /// Whether the per-domain token bucket is consulted at all.
    pub(crate) rate_limit_enabled: bool,

    /// Default refill rate (tokens per second) for new domain buckets.
    pub(crate) default_refill_rps: f64,

    /// Token bucket capacity. 1.0 means no burst allowance.
    pub(crate) bucket_capacity: f64,

    /// Interval between waiter-drain passes in the rate limiter.
    pub(crate) waiter_tick: Duration,

    /// Ceiling on how long a single request may wait for a token before the
    /// operation fails with `RateLimitExceeded`.
    pub(crate) max_token_wait: Duration,

    /// Content cache entry TTL; entries expire by insertion time.
    pub(crate) cache_ttl: Duration,

    /// In-process LRU tier size.
    pub(crate) cache_max_entries: usize,

    /// robots.txt cache TTL per origin.
    pub(crate) robots_ttl: Duration,

    /// Hosts exempted from SSRF checks. Overrides the deny rules.
    pub(crate) allow_hosts: Vec<String>,

    /// Completeness guard: minimum paragraphs before augmentation kicks in.
    pub(crate) min_paragraphs: usize,

    /// Completeness guard: minimum content length in characters.
    pub(crate) min_content_chars: usize,

    /// Completeness guard: minimum word count.
    pub(crate) min_words: usize,

    /// LLM extractor fence. The candidate is discarded past this.
    pub(crate) llm_timeout: Duration,

    /// External library bridge fence.
    pub(crate) external_timeout: Duration,

    /// Maximum `node` events emitted per stream before truncation.
    pub(crate) max_nodes: usize,

    /// Job queue worker pool size.
    pub(crate) job_concurrency: usize,

    /// Job queue scheduling tick.
    pub(crate) worker_tick: Duration,

    /// Default per-job timeout when the job options carry none.
    pub(crate) default_job_timeout: Duration,

    /// Terminal jobs retained before oldest-first eviction.
    pub(crate) terminal_retention: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            render_timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            max_body_bytes: 10 * 1024 * 1024,
            rate_limit_enabled: true,
            default_refill_rps: DEFAULT_REFILL_RPS,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            waiter_tick: Duration::from_millis(DEFAULT_WAITER_TICK_MS),
            max_token_wait: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_max_entries: 512,
            robots_ttl: Duration::from_secs(DEFAULT_ROBOTS_TTL_SECS),
            allow_hosts: Vec::new(),
            min_paragraphs: 3,
            min_content_chars: 300,
            min_words: 80,
            llm_timeout: Duration::from_secs(10),
            external_timeout: Duration::from_secs(15),
            max_nodes: DEFAULT_MAX_NODES,
            job_concurrency: num_cpus::get().clamp(2, 8),
            worker_tick: Duration::from_millis(DEFAULT_WORKER_TICK_MS),
            default_job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            terminal_retention: DEFAULT_TERMINAL_RETENTION,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        self.render_timeout
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        self.retry_base_delay
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    #[must_use]
    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit_enabled
    }

    #[must_use]
    pub fn default_refill_rps(&self) -> f64 {
        self.default_refill_rps
    }

    #[must_use]
    pub fn bucket_capacity(&self) -> f64 {
        self.bucket_capacity
    }

    #[must_use]
    pub fn waiter_tick(&self) -> Duration {
        self.waiter_tick
    }

    #[must_use]
    pub fn max_token_wait(&self) -> Duration {
        self.max_token_wait
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    #[must_use]
    pub fn cache_max_entries(&self) -> usize {
        self.cache_max_entries
    }

    #[must_use]
    pub fn robots_ttl(&self) -> Duration {
        self.robots_ttl
    }

    #[must_use]
    pub fn allow_hosts(&self) -> &[String] {
        &self.allow_hosts
    }

    #[must_use]
    pub fn min_paragraphs(&self) -> usize {
        self.min_paragraphs
    }

    #[must_use]
    pub fn min_content_chars(&self) -> usize {
        self.min_content_chars
    }

    #[must_use]
    pub fn min_words(&self) -> usize {
        self.min_words
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout
    }

    #[must_use]
    pub fn external_timeout(&self) -> Duration {
        self.external_timeout
    }

    #[must_use]
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    #[must_use]
    pub fn job_concurrency(&self) -> usize {
        self.job_concurrency
    }

    #[must_use]
    pub fn worker_tick(&self) -> Duration {
        self.worker_tick
    }

    #[must_use]
    pub fn default_job_timeout(&self) -> Duration {
        self.default_job_timeout
    }

    #[must_use]
    pub fn terminal_retention(&self) -> usize {
        self.terminal_retention
    }
}
