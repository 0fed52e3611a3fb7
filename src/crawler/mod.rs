//! Link-following crawler: bounded frontier, dedup, sitemap seeding,
//! concurrency control, and cancellation.

pub mod engine;
pub mod links;
pub mod sitemap;
pub mod types;

pub use engine::Crawler;
pub use links::{LinkFilter, extract_hrefs, extract_links, extract_title};
pub use types::{
    CancelHandle, CancelSignal, CrawlEvent, CrawlOptions, CrawlPage, CrawlResult, CrawlStats,
    CrawlStatus, CrawlStrategy, PageStatus, cancel_pair,
};
