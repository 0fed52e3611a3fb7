//! Job records, options, and progress events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states. `Completed`, `Failed`, and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Per-job options supplied at enqueue time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// 1–10; higher runs first.
    pub priority: u8,
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Per-job timeout in milliseconds; the queue default applies when
    /// absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            priority: 5,
            retries: 0,
            timeout_ms: None,
            webhook_url: None,
            metadata: None,
        }
    }
}

impl JobOptions {
    /// Clamp priority into its documented range.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.priority = self.priority.clamp(1, 10);
        self
    }
}

/// One job record, the unit the queue schedules and reports on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub options: JobOptions,
    /// 0–100.
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

/// Events delivered to progress listeners, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    #[serde(rename_all = "camelCase")]
    Status {
        job_id: String,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        job_id: String,
        progress: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        job_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Error { job_id: String, error: String },
}

impl JobEvent {
    /// Whether this event ends a progress stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Complete { .. } | Self::Error { .. } => true,
            Self::Status { status, .. } => status.is_terminal(),
            Self::Progress { .. } => false,
        }
    }
}

/// Webhook body POSTed on terminal transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub job_id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn priority_clamps_into_range() {
        assert_eq!(JobOptions { priority: 0, ..Default::default() }.sanitized().priority, 1);
        assert_eq!(JobOptions { priority: 99, ..Default::default() }.sanitized().priority, 10);
    }

    #[test]
    fn webhook_payload_wire_shape() {
        let payload = WebhookPayload {
            job_id: "j1".into(),
            job_type: "crawl".into(),
            status: JobStatus::Completed,
            result: Some(serde_json::json!({"pages": 3})),
            error: None,
            duration_ms: Some(1200),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["jobId"], "j1");
        assert_eq!(json["type"], "crawl");
        assert_eq!(json["status"], "completed");
        assert!(json.get("error").is_none());
    }
}
