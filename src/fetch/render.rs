//! Seam for headless-browser rendering.
//!
//! Browser automation lives outside this crate. The fetch pipeline only
//! needs rendered HTML plus diagnostics, so the collaborator is a single
//! trait. With no renderer configured, rendered-mode requests fall back to
//! plain HTTP and report `rendered: false`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of rendering a page in a real browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub html: String,
    pub final_url: String,
    pub status: u16,
    /// Collaborator-defined diagnostics (console errors, timings, blocked
    /// resources). Passed through to stream metadata untouched.
    #[serde(default)]
    pub diagnostics: HashMap<String, serde_json::Value>,
}

/// Headless-browser collaborator.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` and return the settled DOM. Implementations own their
    /// timeout discipline below the pipeline's `render_timeout` ceiling.
    async fn render(&self, url: &str) -> anyhow::Result<RenderedPage>;
}
