//! Fetch pipeline: SSRF validation, rate limiting, robots.txt, the retrying
//! HTTP client, the two-tier content cache, and the renderer seam.

pub mod cache;
pub mod fetcher;
pub mod http_client;
pub mod rate_limiter;
pub mod render;
pub mod robots;
pub mod ssrf;

pub use cache::{
    CacheEntry, CacheLookup, ContentCache, FetchMode, SharedCacheBackend, fetch_key, quota_key,
    quota_ttl,
};
pub use fetcher::{FetchOutcome, Fetcher};
pub use http_client::{ConditionalHeaders, HttpClient, HttpResponse};
pub use rate_limiter::RateLimiter;
pub use render::{PageRenderer, RenderedPage};
pub use robots::{RobotsManager, RobotsRules};
pub use ssrf::UrlValidator;
