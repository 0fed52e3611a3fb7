//! Tagged events for the single-URL extraction stream.
//!
//! Ordering contract: `metadata` first, `done` last, `node` events strictly
//! ascending in `order`, all of them before `provenance`. The full sequence
//! matches `metadata alert? (confidence extraction node* provenance)? done`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::distill::NodeType;

/// Why an alert was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    EmptyBody,
    ChallengeDetected,
}

/// Events in the single-URL stream, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    #[serde(rename_all = "camelCase")]
    Metadata {
        url: String,
        final_url: String,
        status: u16,
        content_type: Option<String>,
        fetch_timestamp: chrono::DateTime<chrono::Utc>,
        duration_ms: u64,
        from_cache: bool,
        rendered: bool,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        render_diagnostics: HashMap<String, serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Alert {
        kind: AlertKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Confidence {
        overall_confidence: f64,
        heuristics: ConfidenceHeuristics,
    },
    #[serde(rename_all = "camelCase")]
    Extraction {
        method: String,
        confidence: f64,
        fallback_used: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        byline: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        site_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Node {
        id: String,
        hash: String,
        order: usize,
        kind: NodeType,
        text: String,
        confidence: f64,
    },
    #[serde(rename_all = "camelCase")]
    Provenance {
        extractor: String,
        checksum: String,
        node_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        nodes: usize,
        truncated: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        byline: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        site_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        excerpt: Option<String>,
    },
}

/// Inputs behind the stream-level confidence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceHeuristics {
    pub fallback_used: bool,
    pub node_count: usize,
    pub content_length: usize,
    pub has_byline: bool,
}

impl StreamEvent {
    /// Short tag for sequence assertions.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Metadata { .. } => "metadata",
            Self::Alert { .. } => "alert",
            Self::Confidence { .. } => "confidence",
            Self::Extraction { .. } => "extraction",
            Self::Node { .. } => "node",
            Self::Provenance { .. } => "provenance",
            Self::Done { .. } => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_discriminator() {
        let event = StreamEvent::Alert {
            kind: AlertKind::ChallengeDetected,
            reason: Some("captcha".into()),
            pattern: Some("(?i)captcha".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "alert");
        assert_eq!(json["kind"], "challenge_detected");
        assert_eq!(json["reason"], "captcha");
    }

    #[test]
    fn node_payload_uses_camel_case() {
        let event = StreamEvent::Done {
            nodes: 3,
            truncated: false,
            reason: None,
            title: Some("T".into()),
            byline: None,
            site_name: Some("Site".into()),
            excerpt: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["siteName"], "Site");
        assert!(json.get("byline").is_none());
    }
}
