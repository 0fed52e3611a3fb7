//! Crawler behavior against a mock site: budgets, dedup, robots,
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use pagesift::distill::Distiller;
use pagesift::fetch::Fetcher;
use pagesift::{
    CrawlOptions, CrawlStatus, Crawler, PageStatus, ServiceConfig, cancel_pair,
};

fn test_config() -> ServiceConfig {
    ServiceConfig::builder()
        .allow_host("127.0.0.1")
        .retry_base_delay(Duration::from_millis(10))
        .default_refill_rps(1000.0)
        .build()
}

fn crawler_for(config: &ServiceConfig) -> Crawler {
    let fetcher = Arc::new(Fetcher::new(config).unwrap());
    let distiller = Arc::new(Distiller::new(config));
    Crawler::new(config, fetcher, distiller)
}

fn page_body(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{href}\">{href}</a>"))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <p>Content for {title} padded to a reasonable paragraph length for extraction.</p>\
         {anchors}</body></html>"
    )
}

#[tokio::test]
async fn follows_links_and_respects_max_pages() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(page_body("root", &["/a", "/b", "/c"]))
        .create_async()
        .await;
    for path in ["/a", "/b", "/c"] {
        server
            .mock("GET", path)
            .with_status(200)
            .with_body(page_body(path, &[]))
            .create_async()
            .await;
    }

    let crawler = crawler_for(&test_config());
    let result = crawler
        .crawl(
            &server.url(),
            CrawlOptions {
                max_depth: 2,
                max_pages: 3,
                respect_robots: false,
                concurrency: 1,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.status, CrawlStatus::Completed);
    // The budget is a hard bound: the fourth candidate is never fetched.
    assert_eq!(result.pages.len(), 3);
    assert_eq!(result.stats.total_pages, 3);
    assert!(result.stats.success_pages >= 1);
    assert_eq!(result.stats.unique_domains, 1);
}

#[tokio::test]
async fn never_revisits_a_normalized_url() {
    let mut server = mockito::Server::new_async().await;
    // Root links to itself under fragment/query variants that normalize to
    // the same resource.
    let root = server
        .mock("GET", "/")
        .with_status(200)
        .with_body(page_body("root", &["/#frag", "/", "/page"]))
        .expect(1)
        .create_async()
        .await;
    let page = server
        .mock("GET", "/page")
        .with_status(200)
        .with_body(page_body("leaf page", &["/"]))
        .expect(1)
        .create_async()
        .await;

    let crawler = crawler_for(&test_config());
    let result = crawler
        .crawl(
            &server.url(),
            CrawlOptions {
                max_depth: 3,
                max_pages: 10,
                respect_robots: false,
                concurrency: 1,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.status, CrawlStatus::Completed);
    assert_eq!(result.pages.len(), 2);
    root.assert_async().await;
    page.assert_async().await;
}

#[tokio::test]
async fn identical_content_is_skipped_not_expanded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(page_body("root", &["/copy1", "/copy2"]))
        .create_async()
        .await;
    // Two URLs serving byte-identical bodies.
    let twin = "<html><head><title>twin</title></head><body><p>The same body on two URLs, long enough to extract.</p></body></html>";
    for path in ["/copy1", "/copy2"] {
        server
            .mock("GET", path)
            .with_status(200)
            .with_body(twin)
            .create_async()
            .await;
    }

    let crawler = crawler_for(&test_config());
    let result = crawler
        .crawl(
            &server.url(),
            CrawlOptions {
                max_depth: 1,
                max_pages: 10,
                respect_robots: false,
                concurrency: 1,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    let skipped: Vec<_> = result
        .pages
        .iter()
        .filter(|p| p.status == PageStatus::Skipped)
        .collect();
    assert_eq!(skipped.len(), 1, "one twin is recorded as a duplicate");
    assert_eq!(result.stats.skipped_pages, 1);
}

#[tokio::test]
async fn robots_disallow_is_recorded_not_fetched() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /private\n")
        .create_async()
        .await;
    let private = server
        .mock("GET", "/private")
        .with_status(200)
        .with_body("should never be requested")
        .expect(0)
        .create_async()
        .await;

    let crawler = crawler_for(&test_config());
    let result = crawler
        .crawl(
            &format!("{}/private", server.url()),
            CrawlOptions {
                max_depth: 0,
                max_pages: 1,
                respect_robots: true,
                concurrency: 1,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.pages[0].status, PageStatus::RobotsBlocked);
    private.assert_async().await;
}

#[tokio::test]
async fn cancellation_stops_new_fetches_and_marks_the_result() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(page_body("root", &["/one", "/two"]))
        .create_async()
        .await;
    for path in ["/one", "/two"] {
        server
            .mock("GET", path)
            .with_status(200)
            .with_body(page_body(path, &[]))
            .create_async()
            .await;
    }

    let crawler = crawler_for(&test_config());
    let (handle, signal) = cancel_pair();

    let mut events = crawler.subscribe();
    let canceller = tokio::spawn(async move {
        // Cancel immediately after the first page fetch event.
        while let Ok(event) = events.recv().await {
            if matches!(event, pagesift::crawler::CrawlEvent::PageFetched { .. }) {
                handle.cancel();
                break;
            }
        }
    });

    let result = crawler
        .crawl(
            &server.url(),
            CrawlOptions {
                max_depth: 1,
                max_pages: 10,
                respect_robots: false,
                concurrency: 1,
                ..Default::default()
            },
            Some(signal),
        )
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(result.status, CrawlStatus::Cancelled);
    assert!(
        (1..=2).contains(&result.pages.len()),
        "in-flight work completes, nothing new starts; got {} pages",
        result.pages.len()
    );
}

#[tokio::test]
async fn sitemap_seeds_the_frontier() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/sitemap.xml")
        .with_status(200)
        .with_body(format!(
            "<?xml version=\"1.0\"?><urlset><url><loc>{0}/from-sitemap</loc></url></urlset>",
            server.url()
        ))
        .create_async()
        .await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(page_body("root", &[]))
        .create_async()
        .await;
    let seeded = server
        .mock("GET", "/from-sitemap")
        .with_status(200)
        .with_body(page_body("seeded", &[]))
        .expect(1)
        .create_async()
        .await;

    let crawler = crawler_for(&test_config());
    let result = crawler
        .crawl(
            &server.url(),
            CrawlOptions {
                max_depth: 1,
                max_pages: 5,
                respect_robots: false,
                concurrency: 1,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.status, CrawlStatus::Completed);
    assert!(result.pages.iter().any(|p| p.url.ends_with("/from-sitemap")));
    seeded.assert_async().await;
}
