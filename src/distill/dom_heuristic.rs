//! DOM-heuristic extractor: paragraph/heading density walk.
//!
//! Collects every substantial paragraph and heading in the document with an
//! approximate CSS selector locating each block. Lower precision than the
//! readability pass but it almost always produces something, which makes it
//! the ensemble's safety net.

use std::collections::HashMap;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::distill::extractor::{Candidate, CandidateBlock, Extractor, ExtractionMethod};
use crate::distill::html_meta::{page_metadata, page_title};
use crate::utils::clean_fragment;

/// Paragraphs below this length are treated as chrome and skipped.
const MIN_PARAGRAPH_CHARS: usize = 25;

pub struct DomHeuristicExtractor;

#[async_trait]
impl Extractor for DomHeuristicExtractor {
    fn name(&self) -> &'static str {
        "dom-heuristic"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::DomHeuristic
    }

    async fn extract(&self, html: &str, url: &str) -> Option<Candidate> {
        let html = html.to_string();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || extract_sync(&html, &url))
            .await
            .ok()
            .flatten()
    }
}

fn extract_sync(html: &str, _url: &str) -> Option<Candidate> {
    let doc = Html::parse_document(html);
    let block_sel = Selector::parse("p, h1, h2, h3, h4, h5, h6").ok()?;

    let mut tag_counts: HashMap<String, usize> = HashMap::new();
    let mut blocks = Vec::new();
    let mut text_len = 0usize;

    for el in doc.select(&block_sel) {
        let tag = el.value().name().to_string();
        let index = tag_counts.entry(tag.clone()).or_insert(0);
        *index += 1;
        let selector = format!("{tag}:nth-of-type({index})");

        let heading = tag.starts_with('h');
        let text = clean_fragment(&el.text().collect::<String>());
        if text.is_empty() || (!heading && text.len() < MIN_PARAGRAPH_CHARS) {
            continue;
        }
        text_len += text.len();
        blocks.push(CandidateBlock {
            text,
            heading,
            selector: Some(selector),
        });
    }

    if blocks.iter().all(|b| b.heading) || blocks.is_empty() {
        return None;
    }

    let paragraphs = blocks.iter().filter(|b| !b.heading).count();
    // Density heuristic: more paragraphs and more text mean more confidence,
    // but this method never claims to beat a precise extraction.
    let confidence = (0.35
        + (paragraphs as f64 / 30.0).min(0.2)
        + (text_len as f64 / 6000.0).min(0.15))
    .clamp(0.0, 0.7);

    Some(Candidate {
        method: ExtractionMethod::DomHeuristic,
        title: page_title(&doc),
        blocks,
        confidence,
        metadata: page_metadata(&doc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_blocks_with_selectors() {
        let html = r#"<html><head><title>Listing</title></head><body>
          <h2>Section one</h2>
          <p>This paragraph easily clears the minimum length threshold for inclusion.</p>
          <p>tiny</p>
          <p>Another paragraph that is long enough to be treated as real content here.</p>
        </body></html>"#;
        let candidate = DomHeuristicExtractor
            .extract(html, "https://example.com/listing")
            .await
            .expect("candidate");
        assert_eq!(candidate.paragraph_count(), 2);
        assert_eq!(
            candidate.blocks[0].selector.as_deref(),
            Some("h2:nth-of-type(1)")
        );
        assert_eq!(
            candidate.blocks[1].selector.as_deref(),
            Some("p:nth-of-type(1)")
        );
        // The skipped tiny paragraph still advances the nth-of-type counter.
        assert_eq!(
            candidate.blocks[2].selector.as_deref(),
            Some("p:nth-of-type(3)")
        );
    }

    #[tokio::test]
    async fn heading_only_pages_yield_nothing() {
        let html = "<html><body><h1>Just a banner</h1></body></html>";
        assert!(
            DomHeuristicExtractor
                .extract(html, "https://example.com/")
                .await
                .is_none()
        );
    }
}
