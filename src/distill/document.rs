//! The distilled document: typed nodes plus provenance and confidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::distill::confidence::ConfidenceBreakdown;
use crate::distill::extractor::ExtractionMethod;

/// Node kind within a distilled document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Paragraph,
    Heading,
}

/// Locates a piece of extracted text back in the original byte stream.
/// `byte_start < byte_end` when the location is known, both zero otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
    pub byte_start: usize,
    pub byte_end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// One ordered content node. `order` is dense from zero; `id` is unique
/// within the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub id: String,
    pub order: usize,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_spans: Option<Vec<SourceSpan>>,
}

/// Output of the distillation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistilledDocument {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    pub content_text: String,
    /// Fingerprint of the original HTML.
    pub content_hash: String,
    pub nodes: Vec<DocumentNode>,
    pub extraction_method: ExtractionMethod,
    /// In `[0.1, 0.98]`.
    pub extraction_confidence: f64,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub fallback_used: bool,
}

impl DistilledDocument {
    /// Dense-order invariant check used by tests and debug assertions.
    #[must_use]
    pub fn orders_are_dense(&self) -> bool {
        self.nodes.iter().enumerate().all(|(i, n)| n.order == i)
    }
}
