//! Single-URL stream pipeline: fetch, distill, emit ordered events.
//!
//! The fetch half (validate, rate-limit, cache, HTTP) runs before the
//! stream is returned, so safety failures like SSRF surface as plain errors
//! with no events at all. The distillation half runs in a spawned task that
//! feeds a bounded channel; a dropped consumer cancels it at the next event
//! boundary.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::distill::{DistilledDocument, Distiller, NodeType, sha256_hex};
use crate::error::SiftResult;
use crate::fetch::{FetchMode, FetchOutcome, Fetcher};
use crate::stream::challenge::detect_challenge;
use crate::stream::events::{AlertKind, ConfidenceHeuristics, StreamEvent};
use crate::utils::truncate_chars;

/// Content length at which the long-content boost applies.
const LONG_CONTENT_CHARS: usize = 1500;

/// Content length below which the short-content penalty applies.
const SHORT_CONTENT_CHARS: usize = 300;

/// Node text length treated as "substantial paragraph".
const LONG_NODE_CHARS: usize = 200;

/// Node text length below which the per-node penalty applies.
const SHORT_NODE_CHARS: usize = 40;

/// Composes the fetch pipeline and distiller into one event stream.
pub struct StreamPipeline {
    fetcher: Arc<Fetcher>,
    distiller: Arc<Distiller>,
    max_nodes: usize,
}

impl StreamPipeline {
    #[must_use]
    pub fn new(config: &ServiceConfig, fetcher: Arc<Fetcher>, distiller: Arc<Distiller>) -> Self {
        Self {
            fetcher,
            distiller,
            max_nodes: config.max_nodes(),
        }
    }

    /// Run the pipeline for one URL.
    ///
    /// # Errors
    ///
    /// Fetch-side failures (SSRF, invalid URL, timeout, final HTTP error,
    /// rate-limit exhaustion) surface here; by contract no `metadata` event
    /// is produced for them. Once a stream is returned, everything else is
    /// reported in-band.
    pub async fn run(
        &self,
        url: &str,
        mode: FetchMode,
        policy_hint: Option<String>,
    ) -> SiftResult<ReceiverStream<StreamEvent>> {
        let outcome = self.fetcher.fetch(url, mode).await?;

        let (tx, rx) = mpsc::channel(64);
        let distiller = Arc::clone(&self.distiller);
        let max_nodes = self.max_nodes;
        let url = url.to_string();

        tokio::spawn(async move {
            emit_events(tx, distiller, outcome, url, policy_hint, max_nodes).await;
        });

        Ok(ReceiverStream::new(rx))
    }
}

/// Send one event; `false` means the consumer went away and the pipeline
/// should stop at this boundary.
async fn send(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}

async fn emit_events(
    tx: mpsc::Sender<StreamEvent>,
    distiller: Arc<Distiller>,
    outcome: FetchOutcome,
    url: String,
    policy_hint: Option<String>,
    max_nodes: usize,
) {
    let content_type = outcome
        .headers
        .get("content-type")
        .cloned();

    if !send(
        &tx,
        StreamEvent::Metadata {
            url: url.clone(),
            final_url: outcome.final_url.clone(),
            status: outcome.status,
            content_type,
            fetch_timestamp: Utc::now(),
            duration_ms: outcome.duration_ms,
            from_cache: outcome.from_cache,
            rendered: outcome.rendered,
            render_diagnostics: outcome.render_diagnostics.clone(),
        },
    )
    .await
    {
        return;
    }

    if outcome.body.trim().is_empty() {
        let _ = send(
            &tx,
            StreamEvent::Alert {
                kind: AlertKind::EmptyBody,
                reason: None,
                pattern: None,
            },
        )
        .await
            && send(
                &tx,
                StreamEvent::Done {
                    nodes: 0,
                    truncated: false,
                    reason: Some("empty_body".to_string()),
                    title: None,
                    byline: None,
                    site_name: None,
                    excerpt: None,
                },
            )
            .await;
        return;
    }

    if let Some(challenge) = detect_challenge(&outcome.body) {
        debug!(url = %url, reason = challenge.reason, "challenge page detected");
        if !send(
            &tx,
            StreamEvent::Alert {
                kind: AlertKind::ChallengeDetected,
                reason: Some(challenge.reason.to_string()),
                pattern: Some(challenge.pattern.to_string()),
            },
        )
        .await
        {
            return;
        }
    }

    let doc = distiller
        .distill(&outcome.body, &outcome.final_url, policy_hint.as_deref())
        .await;

    let overall = stream_confidence(&doc);
    if !send(
        &tx,
        StreamEvent::Confidence {
            overall_confidence: overall,
            heuristics: ConfidenceHeuristics {
                fallback_used: doc.fallback_used,
                node_count: doc.nodes.len(),
                content_length: doc.content_text.chars().count(),
                has_byline: doc.byline.is_some(),
            },
        },
    )
    .await
    {
        return;
    }

    if !send(
        &tx,
        StreamEvent::Extraction {
            method: doc.extraction_method.to_string(),
            confidence: doc.extraction_confidence,
            fallback_used: doc.fallback_used,
            byline: doc.byline.clone(),
            site_name: doc.site_name.clone(),
            lang: doc.lang.clone(),
        },
    )
    .await
    {
        return;
    }

    let emitted = doc.nodes.len().min(max_nodes);
    for node in doc.nodes.iter().take(max_nodes) {
        let hash = sha256_hex(
            format!(
                "{}:{}:{}",
                outcome.final_url,
                node.order,
                truncate_chars(&node.text, 64)
            )
            .as_bytes(),
        );
        let confidence = node_confidence(overall, node.node_type, &node.text);
        if !send(
            &tx,
            StreamEvent::Node {
                id: node.id.clone(),
                hash,
                order: node.order,
                kind: node.node_type,
                text: node.text.clone(),
                confidence,
            },
        )
        .await
        {
            return;
        }
    }

    if !send(
        &tx,
        StreamEvent::Provenance {
            extractor: doc.extraction_method.to_string(),
            checksum: sha256_hex(outcome.body.as_bytes()),
            node_count: emitted,
        },
    )
    .await
    {
        return;
    }

    let _ = send(
        &tx,
        StreamEvent::Done {
            nodes: emitted,
            truncated: doc.nodes.len() > max_nodes,
            reason: None,
            title: (!doc.title.is_empty()).then(|| doc.title.clone()),
            byline: doc.byline.clone(),
            site_name: doc.site_name.clone(),
            excerpt: doc.excerpt.clone(),
        },
    )
    .await;
}

/// Stream-level confidence: the scorer's overall plus local boosts, clamped
/// to `[0.2, 0.95]`.
fn stream_confidence(doc: &DistilledDocument) -> f64 {
    let mut confidence = doc.extraction_confidence;
    let content_len = doc.content_text.chars().count();
    if content_len >= LONG_CONTENT_CHARS {
        confidence += 0.1;
    } else if content_len < SHORT_CONTENT_CHARS {
        confidence -= 0.08;
    }
    if doc.byline.is_some() {
        confidence += 0.05;
    }
    if doc.nodes.len() > 5 {
        confidence += 0.05;
    }
    confidence.clamp(0.2, 0.95)
}

/// Per-node confidence: overall plus a shape modifier, clamped to
/// `[0.1, 0.98]`.
fn node_confidence(overall: f64, node_type: NodeType, text: &str) -> f64 {
    let chars = text.chars().count();
    let modifier = if chars < SHORT_NODE_CHARS {
        -0.08
    } else if node_type == NodeType::Heading {
        0.02
    } else if chars > LONG_NODE_CHARS {
        0.04
    } else {
        0.0
    };
    (overall + modifier).clamp(0.1, 0.98)
}
