//! Error taxonomy for the extraction service.
//!
//! Errors split into two families: safety/correctness failures that surface
//! to the caller (SSRF, invalid URLs, timeouts, upstream HTTP errors) and
//! degradable failures that subsystems recover from locally (extraction,
//! policy, cache backend). The recoverable kinds exist so call sites can log
//! them uniformly; they should not cross the public API boundary.

use thiserror::Error;

/// Errors produced by the fetch, distillation, crawl, and job subsystems.
#[derive(Debug, Error)]
pub enum SiftError {
    /// URL resolves to a loopback, private, link-local, or metadata address.
    /// Never retried.
    #[error("refusing to fetch {url}: {reason}")]
    SsrfBlocked { url: String, reason: String },

    /// The input cannot be parsed as an http(s) URL.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Transport-level timeout. Not retried.
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Upstream returned a final non-success status (4xx always, 5xx after
    /// retries are exhausted).
    #[error("upstream returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// Transport-level failure that is not a timeout.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// robots.txt disallows this URL for our user-agent.
    #[error("robots.txt disallows {url}")]
    RobotsBlocked { url: String },

    /// The per-domain token bucket did not admit the request within the
    /// configured wait ceiling.
    #[error("rate limit exceeded for {host}")]
    RateLimitExceeded { host: String },

    /// Every extractor failed or produced empty content. Callers recover
    /// with the fallback path; this only surfaces in diagnostics.
    #[error("all extractors failed for {url}")]
    ExtractionFailed { url: String },

    /// Policy application failed. Recovered by passing HTML through.
    #[error("policy {policy} failed: {reason}")]
    PolicyFailed { policy: String, reason: String },

    /// The shared cache backend is unreachable. Recovered by serving from
    /// the in-process tier.
    #[error("shared cache backend unavailable: {reason}")]
    CacheBackendUnavailable { reason: String },

    /// An anti-bot interstitial was identified in the response body.
    /// Recovered: an alert is emitted and extraction continues.
    #[error("challenge page detected: {reason}")]
    ChallengeDetected { reason: String },

    /// The caller aborted the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl SiftError {
    /// HTTP-ish status code for transport boundaries that want one.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SsrfBlocked { .. } => 403,
            Self::InvalidUrl { .. } => 400,
            Self::Timeout { .. } => 504,
            Self::HttpStatus { status, .. } => *status,
            Self::Network { .. } => 502,
            Self::RobotsBlocked { .. } => 403,
            Self::RateLimitExceeded { .. } => 429,
            Self::ExtractionFailed { .. }
            | Self::PolicyFailed { .. }
            | Self::CacheBackendUnavailable { .. } => 500,
            Self::ChallengeDetected { .. } => 403,
            Self::Cancelled => 499,
        }
    }

    /// Whether the HTTP client may retry after this error. Timeouts, SSRF
    /// refusals, and client errors are final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type SiftResult<T> = Result<T, SiftError>;

impl From<reqwest::Error> for SiftError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_timeout() {
            Self::Timeout { url, timeout_ms: 0 }
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                url,
                status: status.as_u16(),
            }
        } else {
            Self::Network {
                url,
                reason: format!("{err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssrf_is_never_retryable() {
        let err = SiftError::SsrfBlocked {
            url: "http://127.0.0.1/".into(),
            reason: "loopback".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let five = SiftError::HttpStatus {
            url: "http://x/".into(),
            status: 503,
        };
        let four = SiftError::HttpStatus {
            url: "http://x/".into(),
            status: 404,
        };
        assert!(five.is_retryable());
        assert!(!four.is_retryable());
    }
}
