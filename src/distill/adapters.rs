//! Domain adapter registry.
//!
//! Site-specific adapters (marketplaces and the like) live outside this
//! crate; the distiller only needs a registry it can probe before running
//! the generic ensemble. An adapter that answers with high confidence
//! short-circuits extraction entirely.

use std::sync::Arc;

use async_trait::async_trait;

use crate::distill::extractor::Candidate;

/// Confidence at or above which an adapter result bypasses the ensemble.
pub const ADAPTER_SHORT_CIRCUIT_CONFIDENCE: f64 = 0.6;

/// A site-specific extraction adapter.
#[async_trait]
pub trait DomainAdapter: Send + Sync {
    /// Adapter name for logs and provenance.
    fn name(&self) -> &'static str;

    /// Whether this adapter recognizes the URL.
    fn can_handle(&self, url: &str) -> bool;

    /// Extract a structured candidate. `None` means "recognized but could
    /// not extract", which falls back to the generic pipeline.
    async fn extract(&self, html: &str, url: &str) -> Option<Candidate>;
}

/// Registry probed in registration order; first `can_handle` wins.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn DomainAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, adapter: Arc<dyn DomainAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    #[must_use]
    pub fn find(&self, url: &str) -> Option<&Arc<dyn DomainAdapter>> {
        self.adapters.iter().find(|a| a.can_handle(url))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
