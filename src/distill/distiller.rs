//! The distiller: policy → adapters → extractors → ensemble → guard → nodes.
//!
//! Every failure inside the pipeline is recovered locally with a warning
//! log; callers always get a document. The worst case is the fallback path:
//! paragraph nodes from a plain DOM walk at confidence 0.2.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::distill::addressing::{AddressMeta, fingerprint};
use crate::distill::adapters::{ADAPTER_SHORT_CIRCUIT_CONFIDENCE, AdapterRegistry};
use crate::distill::confidence::{self, ConfidenceBreakdown};
use crate::distill::document::{DistilledDocument, DocumentNode, NodeType, SourceSpan};
use crate::distill::dom_heuristic::DomHeuristicExtractor;
use crate::distill::ensemble;
use crate::distill::extractor::{Candidate, CandidateBlock, Extractor, ExtractionMethod};
use crate::distill::policy::PolicyEngine;
use crate::distill::readability::ReadabilityExtractor;
use crate::utils::{clean_fragment, word_count};

/// Fallback confidence when no extractor produced anything.
const FALLBACK_CONFIDENCE: f64 = 0.2;

/// Cap on augmentation paragraphs pulled from the DOM walk.
const MAX_AUGMENT_PARAGRAPHS: usize = 5;

pub struct Distiller {
    policy: PolicyEngine,
    adapters: AdapterRegistry,
    extractors: Vec<Arc<dyn Extractor>>,
    min_paragraphs: usize,
    min_content_chars: usize,
    min_words: usize,
}

impl Distiller {
    /// Distiller with the always-on extractors and no policies or adapters.
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            policy: PolicyEngine::empty(),
            adapters: AdapterRegistry::new(),
            extractors: vec![
                Arc::new(ReadabilityExtractor),
                Arc::new(DomHeuristicExtractor),
            ],
            min_paragraphs: config.min_paragraphs(),
            min_content_chars: config.min_content_chars(),
            min_words: config.min_words(),
        }
    }

    #[must_use]
    pub fn with_policy_engine(mut self, policy: PolicyEngine) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// Register an additional extractor (LLM, external bridge).
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Run the full pipeline. Infallible by design: every internal failure
    /// degrades toward the fallback document.
    pub async fn distill(
        &self,
        html: &str,
        url: &str,
        policy_hint: Option<&str>,
    ) -> DistilledDocument {
        let content_hash = fingerprint(html, &AddressMeta::new(url));
        let timestamp = Utc::now();

        let policy_outcome = self.policy.apply(html, url, policy_hint);
        let working_html = policy_outcome.transformed_html;
        if !policy_outcome.fields_validated {
            debug!(url, errors = ?policy_outcome.validation_errors, "policy field validation incomplete");
        }

        // Domain adapters short-circuit the ensemble when confident.
        if let Some(adapter) = self.adapters.find(url) {
            match adapter.extract(&working_html, url).await {
                Some(candidate) if candidate.confidence >= ADAPTER_SHORT_CIRCUIT_CONFIDENCE => {
                    debug!(url, adapter = adapter.name(), "domain adapter short-circuit");
                    let breakdown =
                        confidence::score(&candidate, std::slice::from_ref(&candidate), url);
                    return self.finish(candidate, breakdown, html, url, &content_hash, timestamp);
                }
                Some(_) | None => {
                    debug!(url, adapter = adapter.name(), "adapter declined, running ensemble");
                }
            }
        }

        // Generic extractors run in parallel; they share no mutable state.
        let futures = self
            .extractors
            .iter()
            .map(|extractor| extractor.extract(&working_html, url));
        let mut candidates: Vec<Candidate> = join_all(futures)
            .await
            .into_iter()
            .flatten()
            .filter(|c| !c.is_empty())
            .collect();

        if candidates.is_empty() {
            warn!(url, "no extractor produced content, using fallback walk");
            let fallback = fallback_candidate(&working_html);
            let breakdown = confidence::score(&fallback, std::slice::from_ref(&fallback), url);
            return self.finish(fallback, breakdown, html, url, &content_hash, timestamp);
        }

        let selection = ensemble::select_best(&candidates);
        debug!(url, "{}", selection.explanation);
        let mut best = candidates[selection.selected].clone();

        // Completeness guard: reject too-short winners.
        if self.is_incomplete(&best) {
            let replacement = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != selection.selected)
                .map(|(_, c)| c)
                .find(|c| {
                    c.paragraph_count() >= self.min_paragraphs
                        || c.content_len() >= self.min_content_chars
                });
            if let Some(better) = replacement {
                debug!(url, from = %best.method, to = %better.method, "completeness guard swapped candidate");
                best = better.clone();
            } else {
                let added = augment_with_fallback(&mut best, &working_html);
                if added > 0 {
                    debug!(url, added, "completeness guard augmented with fallback paragraphs");
                }
            }
        }

        let breakdown = confidence::score(&best, &candidates, url);
        self.finish(best, breakdown, html, url, &content_hash, timestamp)
    }

    fn is_incomplete(&self, candidate: &Candidate) -> bool {
        let text = candidate.content_text();
        candidate.paragraph_count() < self.min_paragraphs
            || text.chars().count() < self.min_content_chars
            || word_count(&text) < self.min_words
    }

    /// Convert the winning candidate into the typed document.
    fn finish(
        &self,
        candidate: Candidate,
        breakdown: ConfidenceBreakdown,
        original_html: &str,
        url: &str,
        content_hash: &str,
        timestamp: chrono::DateTime<Utc>,
    ) -> DistilledDocument {
        let nodes: Vec<DocumentNode> = candidate
            .blocks
            .iter()
            .enumerate()
            .map(|(order, block)| {
                let span = locate_span(
                    original_html,
                    &block.text,
                    url,
                    content_hash,
                    timestamp,
                    block.selector.clone(),
                );
                DocumentNode {
                    id: format!("{}-{order}", candidate.method),
                    order,
                    node_type: if block.heading {
                        NodeType::Heading
                    } else {
                        NodeType::Paragraph
                    },
                    text: block.text.clone(),
                    source_spans: Some(vec![span]),
                }
            })
            .collect();

        let fallback_used = candidate.method == ExtractionMethod::DomHeuristic && nodes.len() < 3
            || candidate.method == ExtractionMethod::Fallback;

        DistilledDocument {
            title: candidate.title.clone().unwrap_or_default(),
            byline: candidate.metadata.author.clone(),
            excerpt: candidate.metadata.excerpt.clone(),
            lang: candidate.metadata.lang.clone(),
            site_name: candidate.metadata.site_name.clone(),
            content_text: candidate.content_text(),
            content_hash: content_hash.to_string(),
            nodes,
            extraction_method: candidate.method,
            extraction_confidence: breakdown.overall,
            confidence_breakdown: breakdown,
            fallback_used,
        }
    }
}

/// Byte span of the text inside the original HTML, by substring search.
/// Unlocatable text gets a zero span, which consumers treat as "unknown".
fn locate_span(
    original_html: &str,
    text: &str,
    url: &str,
    content_hash: &str,
    timestamp: chrono::DateTime<Utc>,
    selector: Option<String>,
) -> SourceSpan {
    let (byte_start, byte_end) = match original_html.find(text) {
        Some(start) => (start, start + text.len()),
        None => (0, 0),
    };
    SourceSpan {
        url: url.to_string(),
        timestamp,
        content_hash: content_hash.to_string(),
        byte_start,
        byte_end,
        selector,
    }
}

/// Plain DOM walk producing fallback paragraphs: every `<p>`, or failing
/// that the body text chopped into chunks.
fn fallback_blocks(html: &str) -> Vec<CandidateBlock> {
    let doc = Html::parse_document(html);
    let mut blocks = Vec::new();

    if let Ok(sel) = Selector::parse("p") {
        for el in doc.select(&sel) {
            let text = clean_fragment(&el.text().collect::<String>());
            if !text.is_empty() {
                blocks.push(CandidateBlock {
                    text,
                    heading: false,
                    selector: None,
                });
            }
        }
    }

    if blocks.is_empty()
        && let Ok(sel) = Selector::parse("body")
        && let Some(body) = doc.select(&sel).next()
    {
        let text = clean_fragment(&body.text().collect::<String>());
        for chunk in text
            .split(". ")
            .filter(|c| !c.trim().is_empty())
            .take(MAX_AUGMENT_PARAGRAPHS)
        {
            blocks.push(CandidateBlock {
                text: chunk.trim().to_string(),
                heading: false,
                selector: None,
            });
        }
    }

    blocks
}

fn fallback_candidate(html: &str) -> Candidate {
    Candidate {
        method: ExtractionMethod::Fallback,
        title: {
            let doc = Html::parse_document(html);
            crate::distill::html_meta::page_title(&doc)
        },
        blocks: fallback_blocks(html),
        confidence: FALLBACK_CONFIDENCE,
        metadata: Default::default(),
    }
}

/// Append up to `MAX_AUGMENT_PARAGRAPHS` new fallback paragraphs that the
/// candidate does not already contain. Returns how many were added.
fn augment_with_fallback(candidate: &mut Candidate, html: &str) -> usize {
    let existing: std::collections::HashSet<&str> =
        candidate.blocks.iter().map(|b| b.text.as_str()).collect();
    let fresh: Vec<CandidateBlock> = fallback_blocks(html)
        .into_iter()
        .filter(|b| !existing.contains(b.text.as_str()))
        .take(MAX_AUGMENT_PARAGRAPHS)
        .collect();
    let added = fresh.len();
    candidate.blocks.extend(fresh);
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<html><head><title>Guard Rails</title>
      <meta name="author" content="Sam Writer"></head><body>
      <article>
        <h1>Guard Rails</h1>
        <p>The opening paragraph carries enough words to matter in the scoring pass, spreads its argument across several clauses, and takes its time getting to the point the way real prose does.</p>
        <p>A second paragraph continues the development of the subject with more than trivial content inside it, because a fixture that trips the completeness guard would test the wrong code path entirely.</p>
        <p>The third paragraph closes out the argument with a reasonable amount of trailing commentary, a couple of asides, and enough words that the word-count threshold is comfortably cleared.</p>
        <p>A fourth paragraph exists so that both the paragraph-count and content-length checks have plenty of margin, no matter which extractor the ensemble ends up preferring for this page.</p>
      </article></body></html>"#;

    #[tokio::test]
    async fn distills_an_article_into_ordered_nodes() {
        let distiller = Distiller::new(&ServiceConfig::default());
        let doc = distiller
            .distill(ARTICLE, "https://example.com/guard-rails", None)
            .await;

        assert_eq!(doc.title, "Guard Rails");
        assert_eq!(doc.byline.as_deref(), Some("Sam Writer"));
        assert!(doc.orders_are_dense());
        assert!(doc.nodes.len() >= 4);
        assert!(doc.extraction_confidence >= 0.1 && doc.extraction_confidence <= 0.98);
        assert!(doc.content_hash.starts_with("sha256:"));
        // First node is the heading.
        assert_eq!(doc.nodes[0].node_type, NodeType::Heading);
        // Node ids carry the method prefix.
        assert!(doc.nodes[0].id.starts_with(doc.extraction_method.as_str()));
    }

    #[tokio::test]
    async fn empty_page_takes_the_fallback_path() {
        let distiller = Distiller::new(&ServiceConfig::default());
        let doc = distiller
            .distill("<html><body><nav>menu</nav></body></html>", "https://example.com/empty", None)
            .await;
        assert_eq!(doc.extraction_method, ExtractionMethod::Fallback);
        assert!(doc.fallback_used);
        assert!(doc.extraction_confidence >= 0.1);
    }

    #[tokio::test]
    async fn source_spans_locate_verbatim_text() {
        let html = "<html><body><article><h1>Title Words</h1>\
            <p>Exact sentence one that is sufficiently long for extraction to keep.</p>\
            <p>Exact sentence two that is also sufficiently long for extraction to keep.</p>\
            <p>Exact sentence three rounding out the trio for the paragraph minimum.</p>\
            </article></body></html>";
        let distiller = Distiller::new(&ServiceConfig::default());
        let doc = distiller.distill(html, "https://example.com/spans", None).await;
        let located = doc
            .nodes
            .iter()
            .filter_map(|n| n.source_spans.as_ref())
            .flatten()
            .filter(|s| s.byte_end > s.byte_start)
            .count();
        assert!(located > 0, "at least one span should be located");
    }
}
