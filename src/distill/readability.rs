//! Readability-style extractor: tree-score heuristic over the DOM.
//!
//! Scores candidate containers by the paragraph text they hold, penalizing
//! link-dense blocks, and extracts the winner's paragraphs and headings in
//! document order. High precision on article-shaped pages, nothing on
//! navigation-heavy ones.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::distill::extractor::{
    Candidate, CandidateBlock, Extractor, ExtractionMethod,
};
use crate::distill::html_meta::{page_metadata, page_title};
use crate::utils::clean_fragment;

/// Minimum characters of paragraph text before a container is considered.
const MIN_CONTAINER_TEXT: usize = 120;

/// Paragraphs shorter than this inside the winning container are skipped.
const MIN_PARAGRAPH_CHARS: usize = 20;

pub struct ReadabilityExtractor;

#[async_trait]
impl Extractor for ReadabilityExtractor {
    fn name(&self) -> &'static str {
        "readability"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Readability
    }

    async fn extract(&self, html: &str, url: &str) -> Option<Candidate> {
        let html = html.to_string();
        let url = url.to_string();
        // DOM parsing is CPU-bound and the parsed tree is not Send, so the
        // whole pass runs on the blocking pool.
        tokio::task::spawn_blocking(move || extract_sync(&html, &url))
            .await
            .ok()
            .flatten()
    }
}

fn extract_sync(html: &str, _url: &str) -> Option<Candidate> {
    let doc = Html::parse_document(html);
    let container_sel =
        Selector::parse("article, main, section, div, td").ok()?;
    let paragraph_sel = Selector::parse("p").ok()?;
    let link_sel = Selector::parse("a").ok()?;

    let mut best: Option<(f64, ElementRef<'_>)> = None;
    for container in doc.select(&container_sel) {
        let score = score_container(&container, &paragraph_sel, &link_sel);
        if score <= 0.0 {
            continue;
        }
        let better = best.as_ref().is_none_or(|(best_score, _)| score > *best_score);
        if better {
            best = Some((score, container));
        }
    }

    let (score, container) = best?;
    let blocks = collect_blocks(&container)?;
    if blocks.is_empty() {
        return None;
    }

    let text_len: usize = blocks.iter().map(|b| b.text.len()).sum();
    // Self-confidence grows with recovered text, shrinks with a weak score.
    let confidence = (0.5 + (text_len as f64 / 4000.0).min(0.3) + (score / 200.0).min(0.15))
        .clamp(0.0, 0.95);

    Some(Candidate {
        method: ExtractionMethod::Readability,
        title: page_title(&doc),
        blocks,
        confidence,
        metadata: page_metadata(&doc),
    })
}

/// Container score: paragraph text volume plus comma density, damped by the
/// fraction of text living inside links.
fn score_container(
    container: &ElementRef<'_>,
    paragraph_sel: &Selector,
    link_sel: &Selector,
) -> f64 {
    let mut text_len = 0usize;
    let mut commas = 0usize;
    for paragraph in container.select(paragraph_sel) {
        let text = clean_fragment(&paragraph.text().collect::<String>());
        text_len += text.len();
        commas += text.matches([',', '，']).count();
    }
    if text_len < MIN_CONTAINER_TEXT {
        return 0.0;
    }

    let link_len: usize = container
        .select(link_sel)
        .map(|a| a.text().collect::<String>().trim().len())
        .sum();
    let total_text = clean_fragment(&container.text().collect::<String>()).len();
    let link_density = if total_text == 0 {
        1.0
    } else {
        link_len as f64 / total_text as f64
    };

    let tag_bonus = match container.value().name() {
        "article" | "main" => 10.0,
        "section" => 4.0,
        _ => 0.0,
    };

    let raw = tag_bonus + commas as f64 + (text_len as f64 / 100.0).min(30.0);
    raw * (1.0 - link_density)
}

/// Paragraphs and headings of the winning container, in document order.
fn collect_blocks(container: &ElementRef<'_>) -> Option<Vec<CandidateBlock>> {
    let block_sel = Selector::parse("p, h1, h2, h3, h4, h5, h6").ok()?;
    let mut blocks = Vec::new();
    for el in container.select(&block_sel) {
        let tag = el.value().name();
        let heading = tag.starts_with('h');
        let text = clean_fragment(&el.text().collect::<String>());
        if text.is_empty() {
            continue;
        }
        if !heading && text.len() < MIN_PARAGRAPH_CHARS {
            continue;
        }
        blocks.push(CandidateBlock {
            text,
            heading,
            selector: None,
        });
    }
    Some(blocks)
}
