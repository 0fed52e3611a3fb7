//! The extractor capability: independent candidates for the ensemble.
//!
//! Each extractor takes HTML and a URL and produces at most one `Candidate`.
//! Extractors are side-effect-free on shared state and safe to run
//! concurrently; the distiller fans them out in parallel and feeds whatever
//! comes back to the ensemble.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a candidate was produced. The order here doubles as the ensemble's
/// deterministic tie-break priority (earlier wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    DomainAdapter,
    Readability,
    ExternalLibrary,
    Llm,
    DomHeuristic,
    Fallback,
}

impl ExtractionMethod {
    /// Tie-break priority; lower is better.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::DomainAdapter => 0,
            Self::Readability => 1,
            Self::ExternalLibrary => 2,
            Self::Llm => 3,
            Self::DomHeuristic => 4,
            Self::Fallback => 5,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainAdapter => "domain-adapter",
            Self::Readability => "readability",
            Self::ExternalLibrary => "external-library",
            Self::Llm => "llm",
            Self::DomHeuristic => "dom-heuristic",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional page metadata recovered alongside the content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// One extracted block of content: a paragraph or a heading, in document
/// order, optionally tagged with a CSS selector locating its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateBlock {
    pub text: String,
    pub heading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// An extraction candidate for the ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Content blocks in document order.
    pub blocks: Vec<CandidateBlock>,
    /// Extractor's self-confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub metadata: CandidateMetadata,
}

impl Candidate {
    /// Full content text: blocks joined by double newlines.
    #[must_use]
    pub fn content_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Count of non-heading blocks.
    #[must_use]
    pub fn paragraph_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.heading).count()
    }

    /// Total content length in characters.
    #[must_use]
    pub fn content_len(&self) -> usize {
        let blocks: usize = self.blocks.iter().map(|b| b.text.chars().count()).sum();
        // Account for the joining newlines.
        blocks + self.blocks.len().saturating_sub(1) * 2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.text.trim().is_empty())
    }
}

/// A generic extraction strategy. Implementations must be pure with respect
/// to shared state; failures are expressed as `None`.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &'static str;

    /// The method tag candidates from this extractor carry.
    fn method(&self) -> ExtractionMethod;

    /// Extract a candidate, or `None` when this strategy has nothing to
    /// offer for the page.
    async fn extract(&self, html: &str, url: &str) -> Option<Candidate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_priority_order_is_stable() {
        let mut methods = [
            ExtractionMethod::DomHeuristic,
            ExtractionMethod::Readability,
            ExtractionMethod::Llm,
            ExtractionMethod::DomainAdapter,
            ExtractionMethod::ExternalLibrary,
        ];
        methods.sort_by_key(ExtractionMethod::priority);
        assert_eq!(
            methods.map(|m| m.as_str()),
            [
                "domain-adapter",
                "readability",
                "external-library",
                "llm",
                "dom-heuristic"
            ]
        );
    }

    #[test]
    fn candidate_accounting() {
        let candidate = Candidate {
            method: ExtractionMethod::Readability,
            title: Some("T".into()),
            blocks: vec![
                CandidateBlock {
                    text: "Heading".into(),
                    heading: true,
                    selector: None,
                },
                CandidateBlock {
                    text: "Body paragraph.".into(),
                    heading: false,
                    selector: None,
                },
            ],
            confidence: 0.8,
            metadata: CandidateMetadata::default(),
        };
        assert_eq!(candidate.paragraph_count(), 1);
        assert_eq!(candidate.content_text(), "Heading\n\nBody paragraph.");
        assert!(!candidate.is_empty());
    }
}
