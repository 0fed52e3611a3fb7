//! pagesift: SSRF-safe web content extraction.
//!
//! Given a URL, the core fetches the page (optionally through a rendering
//! collaborator), detects anti-bot challenges, runs a multi-extractor
//! ensemble to recover the main article, and emits a typed document with
//! provenance and confidence metadata. Two batch facilities build on the
//! same pipeline: a bounded link-following crawler and a priority job queue
//! with webhook delivery.
//!
//! The transport layer, CLI, and browser automation are collaborators, not
//! residents: they plug in through the traits in [`fetch`] and
//! [`service::Collaborators`].

pub mod config;
pub mod crawler;
pub mod distill;
pub mod error;
pub mod fetch;
pub mod jobs;
pub mod service;
pub mod stream;
pub mod utils;

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use crawler::{
    CancelHandle, CancelSignal, CrawlOptions, CrawlPage, CrawlResult, CrawlStats, CrawlStatus,
    CrawlStrategy, Crawler, PageStatus, cancel_pair,
};
pub use distill::{
    Candidate, DistilledDocument, Distiller, DocumentNode, ExtractionMethod, NodeType,
    canonicalize, fingerprint, verify,
};
pub use error::{SiftError, SiftResult};
pub use fetch::{
    CacheEntry, ContentCache, FetchMode, FetchOutcome, Fetcher, HttpClient, PageRenderer,
    RateLimiter, RobotsManager, SharedCacheBackend, UrlValidator,
};
pub use jobs::{Job, JobEvent, JobHandler, JobOptions, JobQueue, JobStatus};
pub use service::{Collaborators, Service};
pub use stream::{AlertKind, StreamEvent, StreamPipeline};
