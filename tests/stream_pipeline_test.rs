//! Stream pipeline event ordering and challenge detection against a mock
//! server.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pagesift::ServiceConfig;
use pagesift::distill::Distiller;
use pagesift::fetch::{FetchMode, Fetcher};
use pagesift::stream::{AlertKind, StreamEvent, StreamPipeline};

const ARTICLE: &str = r#"<html><head><title>Stream Test Article</title>
  <meta name="author" content="A. Writer"></head><body><article>
  <h1>Stream Test Article</h1>
  <p>The opening paragraph of the stream test article carries enough words to be kept by every extractor in the pool.</p>
  <p>A second paragraph continues with sufficient length and detail that the completeness guard has nothing to object to.</p>
  <p>The third paragraph rounds out the fixture so paragraph-count thresholds are cleanly satisfied everywhere.</p>
  </article></body></html>"#;

fn test_config() -> ServiceConfig {
    ServiceConfig::builder()
        .allow_host("127.0.0.1")
        .retry_base_delay(Duration::from_millis(10))
        .build()
}

fn pipeline_for(config: &ServiceConfig) -> StreamPipeline {
    let fetcher = Arc::new(Fetcher::new(config).unwrap());
    let distiller = Arc::new(Distiller::new(config));
    StreamPipeline::new(config, fetcher, distiller)
}

async fn collect_events(pipeline: &StreamPipeline, url: &str) -> Vec<StreamEvent> {
    pipeline
        .run(url, FetchMode::Http, None)
        .await
        .expect("stream")
        .collect::<Vec<_>>()
        .await
}

/// The documented sequence grammar over event tags.
fn assert_sequence(events: &[StreamEvent]) {
    let tags: Vec<&str> = events.iter().map(StreamEvent::tag).collect();
    let joined = tags.join(" ");
    let grammar = regex::Regex::new(
        r"^metadata( alert)?( confidence extraction( node)* provenance)? done$",
    )
    .unwrap();
    assert!(grammar.is_match(&joined), "bad event sequence: {joined}");
}

#[tokio::test]
async fn article_produces_the_full_ordered_sequence() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/article")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(ARTICLE)
        .create_async()
        .await;

    let config = test_config();
    let events = collect_events(&pipeline_for(&config), &format!("{}/article", server.url())).await;
    assert_sequence(&events);

    // metadata first with fetch facts.
    match &events[0] {
        StreamEvent::Metadata {
            status, from_cache, rendered, ..
        } => {
            assert_eq!(*status, 200);
            assert!(!from_cache);
            assert!(!rendered);
        }
        other => panic!("expected metadata first, got {other:?}"),
    }

    // node events are dense and ascending, all before provenance.
    let orders: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Node { order, .. } => Some(*order),
            _ => None,
        })
        .collect();
    assert!(!orders.is_empty());
    assert_eq!(orders, (0..orders.len()).collect::<Vec<_>>());

    // provenance checksum covers the body and counts the nodes.
    let provenance_count = events
        .iter()
        .find_map(|e| match e {
            StreamEvent::Provenance { node_count, checksum, .. } => {
                assert_eq!(checksum.len(), 64);
                Some(*node_count)
            }
            _ => None,
        })
        .expect("provenance event");
    assert_eq!(provenance_count, orders.len());

    // done is last and agrees on the node count.
    match events.last().unwrap() {
        StreamEvent::Done { nodes, truncated, title, .. } => {
            assert_eq!(*nodes, orders.len());
            assert!(!truncated);
            assert_eq!(title.as_deref(), Some("Stream Test Article"));
        }
        other => panic!("expected done last, got {other:?}"),
    }

    // Every node confidence obeys the clamp.
    for event in &events {
        if let StreamEvent::Node { confidence, .. } = event {
            assert!(*confidence >= 0.1 && *confidence <= 0.98);
        }
    }
}

#[tokio::test]
async fn captcha_body_emits_challenge_alert_then_extracts() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/challenge")
        .with_status(200)
        .with_body(
            "<html><body><p>Please complete the CAPTCHA to continue to the site content.</p></body></html>",
        )
        .create_async()
        .await;

    let config = test_config();
    let events =
        collect_events(&pipeline_for(&config), &format!("{}/challenge", server.url())).await;
    assert_sequence(&events);

    match &events[1] {
        StreamEvent::Alert { kind, reason, .. } => {
            assert_eq!(*kind, AlertKind::ChallengeDetected);
            assert_eq!(reason.as_deref(), Some("captcha"));
        }
        other => panic!("expected alert second, got {other:?}"),
    }
    // Extraction still proceeds after the alert.
    assert!(
        events
            .iter()
            .any(|e| matches!(e, StreamEvent::Extraction { .. }))
    );
}

#[tokio::test]
async fn empty_body_short_circuits_to_done() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/empty")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let config = test_config();
    let events = collect_events(&pipeline_for(&config), &format!("{}/empty", server.url())).await;
    let tags: Vec<&str> = events.iter().map(StreamEvent::tag).collect();
    assert_eq!(tags, vec!["metadata", "alert", "done"]);

    match &events[1] {
        StreamEvent::Alert { kind, .. } => assert_eq!(*kind, AlertKind::EmptyBody),
        other => panic!("expected empty-body alert, got {other:?}"),
    }
    match &events[2] {
        StreamEvent::Done { nodes, reason, .. } => {
            assert_eq!(*nodes, 0);
            assert_eq!(reason.as_deref(), Some("empty_body"));
        }
        other => panic!("expected done, got {other:?}"),
    }
}

#[tokio::test]
async fn node_events_truncate_at_the_configured_ceiling() {
    let mut body = String::from("<html><head><title>Long</title></head><body><article>");
    for i in 0..30 {
        body.push_str(&format!(
            "<p>Paragraph number {i} is padded with enough additional words to pass the extractor length filters.</p>"
        ));
    }
    body.push_str("</article></body></html>");

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/long")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let config = ServiceConfig::builder()
        .allow_host("127.0.0.1")
        .max_nodes(5)
        .retry_base_delay(Duration::from_millis(10))
        .build();
    let events = collect_events(&pipeline_for(&config), &format!("{}/long", server.url())).await;
    assert_sequence(&events);

    let node_count = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Node { .. }))
        .count();
    assert_eq!(node_count, 5);
    match events.last().unwrap() {
        StreamEvent::Done { nodes, truncated, .. } => {
            assert_eq!(*nodes, 5);
            assert!(*truncated);
        }
        other => panic!("expected done, got {other:?}"),
    }
}
