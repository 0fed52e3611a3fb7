//! Optional LLM-backed extractor.
//!
//! The model call lives behind the `LlmProvider` collaborator trait; this
//! extractor only adds the fence: a hard timeout, and `None` on any
//! provider failure so the ensemble falls through to the other candidates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::distill::extractor::{
    Candidate, CandidateBlock, CandidateMetadata, Extractor, ExtractionMethod,
};

/// Article structure a provider returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmArticle {
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Provider's own confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// LLM collaborator. Implementations own prompt construction and parsing.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn extract_article(&self, html: &str, url: &str) -> anyhow::Result<LlmArticle>;
}

pub struct LlmExtractor {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl LlmExtractor {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Llm
    }

    async fn extract(&self, html: &str, url: &str) -> Option<Candidate> {
        let result = tokio::time::timeout(self.timeout, self.provider.extract_article(html, url))
            .await;
        let article = match result {
            Ok(Ok(article)) => article,
            Ok(Err(e)) => {
                warn!(url, error = %e, "llm extractor failed, falling through");
                return None;
            }
            Err(_) => {
                warn!(url, timeout_ms = self.timeout.as_millis() as u64, "llm extractor timed out");
                return None;
            }
        };

        let blocks: Vec<CandidateBlock> = article
            .paragraphs
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .map(|text| CandidateBlock {
                text,
                heading: false,
                selector: None,
            })
            .collect();
        if blocks.is_empty() {
            return None;
        }

        Some(Candidate {
            method: ExtractionMethod::Llm,
            title: article.title,
            blocks,
            confidence: article.confidence.unwrap_or(0.7).clamp(0.0, 1.0),
            metadata: CandidateMetadata {
                author: article.author,
                excerpt: article.excerpt,
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;
    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn extract_article(&self, _html: &str, _url: &str) -> anyhow::Result<LlmArticle> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("fence should fire first")
        }
    }

    struct GoodProvider;
    #[async_trait]
    impl LlmProvider for GoodProvider {
        async fn extract_article(&self, _html: &str, _url: &str) -> anyhow::Result<LlmArticle> {
            Ok(LlmArticle {
                title: Some("Model Title".into()),
                paragraphs: vec!["One.".into(), "".into(), "Two.".into()],
                author: None,
                excerpt: None,
                confidence: Some(0.9),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fence_yields_none() {
        let extractor = LlmExtractor::new(Arc::new(SlowProvider), Duration::from_millis(50));
        assert!(extractor.extract("<p>x</p>", "https://x.example/").await.is_none());
    }

    #[tokio::test]
    async fn empty_paragraphs_are_dropped() {
        let extractor = LlmExtractor::new(Arc::new(GoodProvider), Duration::from_secs(5));
        let candidate = extractor
            .extract("<p>x</p>", "https://x.example/")
            .await
            .expect("candidate");
        assert_eq!(candidate.blocks.len(), 2);
        assert!((candidate.confidence - 0.9).abs() < f64::EPSILON);
    }
}
