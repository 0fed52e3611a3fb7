//! Shared configuration constants for pagesift
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default token refill rate: 1 request per second per domain
///
/// Conservative rate that respects server resources while maintaining
/// reasonable fetch throughput. robots.txt `Crawl-delay` directives override
/// this on a per-domain basis.
pub const DEFAULT_REFILL_RPS: f64 = 1.0;

/// Token bucket capacity per domain.
///
/// A capacity of 1 means no burst allowance: at most one request is admitted
/// immediately, all others queue behind the refill rate.
pub const DEFAULT_BUCKET_CAPACITY: f64 = 1.0;

/// Interval between waiter-queue drain passes in the rate limiter.
pub const DEFAULT_WAITER_TICK_MS: u64 = 100;

/// Default maximum crawl depth: 3 levels
///
/// Limits how deep the crawler will follow links from the starting URL.
/// Helps prevent unbounded crawling while capturing most relevant content.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Hard ceiling on crawl depth regardless of caller options.
pub const MAX_CRAWL_DEPTH: u32 = 10;

/// Default content cache TTL: 15 minutes.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 900;

/// Default robots.txt cache TTL: 1 hour.
pub const DEFAULT_ROBOTS_TTL_SECS: u64 = 3600;

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Rendered fetches carry a longer ceiling than plain HTTP.
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 45;

/// Worker scheduling interval for the job queue.
pub const DEFAULT_WORKER_TICK_MS: u64 = 250;

/// Default per-job timeout: 5 minutes.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

/// Terminal jobs retained before eviction of the oldest.
pub const DEFAULT_TERMINAL_RETENTION: usize = 100;

/// Maximum node events emitted per stream before truncation.
pub const DEFAULT_MAX_NODES: usize = 200;

/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "pagesift/0.3 (+https://github.com/pagesift/pagesift)";

/// Approximate characters per token for token accounting.
pub const CHARS_PER_TOKEN: usize = 4;
