//! External library bridge extractor.
//!
//! Wraps a sidecar extraction process (e.g. a Python article extractor)
//! behind a collaborator trait, fenced against unbounded latency the same
//! way the LLM extractor is.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::distill::extractor::{
    Candidate, CandidateBlock, CandidateMetadata, Extractor, ExtractionMethod,
};

/// Structured result from the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalArticle {
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
}

/// Sidecar collaborator: owns process lifecycle and wire format.
#[async_trait]
pub trait ExternalExtractorClient: Send + Sync {
    async fn extract(&self, html: &str, url: &str) -> anyhow::Result<ExternalArticle>;
}

pub struct ExternalLibraryExtractor {
    client: Arc<dyn ExternalExtractorClient>,
    timeout: Duration,
}

impl ExternalLibraryExtractor {
    #[must_use]
    pub fn new(client: Arc<dyn ExternalExtractorClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Extractor for ExternalLibraryExtractor {
    fn name(&self) -> &'static str {
        "external-library"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::ExternalLibrary
    }

    async fn extract(&self, html: &str, url: &str) -> Option<Candidate> {
        let result = tokio::time::timeout(self.timeout, self.client.extract(html, url)).await;
        let article = match result {
            Ok(Ok(article)) => article,
            Ok(Err(e)) => {
                warn!(url, error = %e, "external extractor failed, falling through");
                return None;
            }
            Err(_) => {
                warn!(
                    url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "external extractor timed out"
                );
                return None;
            }
        };

        // The sidecar returns flat text; paragraph structure is re-derived
        // from blank-line separation.
        let blocks: Vec<CandidateBlock> = article
            .text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|text| CandidateBlock {
                text: text.to_string(),
                heading: false,
                selector: None,
            })
            .collect();
        if blocks.is_empty() {
            return None;
        }

        Some(Candidate {
            method: ExtractionMethod::ExternalLibrary,
            title: article.title,
            blocks,
            confidence: 0.75,
            metadata: CandidateMetadata {
                author: article.author,
                publish_date: article.publish_date,
                excerpt: article.excerpt,
                ..Default::default()
            },
        })
    }
}
