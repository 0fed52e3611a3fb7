//! HTTP client with validation pre-hook, timeouts, and retry-on-5xx.
//!
//! All outbound page fetches go through `HttpClient`. The URL validator runs
//! before any socket is opened. Transport errors and 5xx responses are
//! retried with exponential backoff and jitter; timeouts, SSRF refusals, and
//! 4xx responses are final.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::{SiftError, SiftResult};
use crate::fetch::ssrf::UrlValidator;

/// Validators carried by a cached entry, replayed as conditional headers.
#[derive(Debug, Clone, Default)]
pub struct ConditionalHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Response surface consumed by the cache and pipelines.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub final_url: String,
    pub protocol: String,
    pub duration_ms: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub was_not_modified: bool,
}

impl HttpResponse {
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Calculate exponential backoff delay with jitter for request retries.
///
/// Formula: `base_delay * 2^min(attempt, 5) * (1 ± 0.2)`, capped at 30 s.
/// `attempt` counts from 1, so the first retry waits about twice the base
/// delay.
fn retry_backoff(attempt: u32, base_delay: Duration) -> Duration {
    const MAX_DELAY_MS: u64 = 30_000;
    const JITTER_PERCENT: f64 = 0.2;

    let exp_delay = base_delay
        .as_millis()
        .saturating_mul(1 << attempt.min(5)) as u64;
    let jitter = rand::rng().random_range(-JITTER_PERCENT..=JITTER_PERCENT);
    let jittered = (exp_delay as f64 * (1.0 + jitter)) as u64;
    Duration::from_millis(jittered.min(MAX_DELAY_MS))
}

/// HTTP client wrapper shared by the fetch pipeline, robots manager, and
/// webhook delivery.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    validator: UrlValidator,
    user_agent: String,
    request_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    max_body_bytes: usize,
}

impl HttpClient {
    /// Build the shared reqwest client. Panics never: a builder failure here
    /// is a programming error surfaced at startup.
    pub fn new(config: &ServiceConfig) -> SiftResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SiftError::Network {
                url: "<client init>".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            validator: UrlValidator::new(config),
            user_agent: config.user_agent().to_string(),
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries(),
            retry_base_delay: config.retry_base_delay(),
            max_body_bytes: config.max_body_bytes(),
        })
    }

    /// Raw reqwest client for collaborators that manage their own policy
    /// (robots fetches, webhook posts).
    #[must_use]
    pub fn raw(&self) -> reqwest::Client {
        self.client.clone()
    }

    /// Run the SSRF pre-hook without issuing a request.
    pub async fn validate(&self, url: &str) -> SiftResult<url::Url> {
        self.validator.validate(url).await
    }

    /// GET with validation, conditional headers, and the retry wrapper.
    pub async fn get(
        &self,
        url: &str,
        conditional: Option<&ConditionalHeaders>,
    ) -> SiftResult<HttpResponse> {
        self.request(reqwest::Method::GET, url, conditional, None)
            .await
    }

    /// Issue a request with retry-on-5xx semantics.
    ///
    /// # Errors
    ///
    /// `SsrfBlocked` / `InvalidUrl` from the pre-hook, `Timeout` on
    /// transport timeout (never retried), `HttpStatus` for final non-2xx
    /// (4xx immediately, 5xx after retries), `Network` for exhausted
    /// transport errors.
    pub async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        conditional: Option<&ConditionalHeaders>,
        body: Option<String>,
    ) -> SiftResult<HttpResponse> {
        let validated = self.validator.validate(url).await?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = self
                .execute_once(method.clone(), validated.clone(), conditional, body.clone())
                .await;

            match result {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if err.is_retryable() && attempt <= self.max_retries {
                        let delay = retry_backoff(attempt, self.retry_base_delay);
                        warn!(
                            url,
                            attempt,
                            max = self.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn execute_once(
        &self,
        method: reqwest::Method,
        url: url::Url,
        conditional: Option<&ConditionalHeaders>,
        body: Option<String>,
    ) -> SiftResult<HttpResponse> {
        let started = Instant::now();
        let url_str = url.to_string();

        let mut request = self
            .client
            .request(method, url)
            .timeout(self.request_timeout)
            .header(header::USER_AGENT, &self.user_agent);

        if let Some(cond) = conditional {
            if let Some(etag) = &cond.etag
                && let Ok(value) = HeaderValue::from_str(etag)
            {
                request = request.header(header::IF_NONE_MATCH, value);
            }
            if let Some(last_modified) = &cond.last_modified
                && let Ok(value) = HeaderValue::from_str(last_modified)
            {
                request = request.header(header::IF_MODIFIED_SINCE, value);
            }
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SiftError::Timeout {
                    url: url_str.clone(),
                    timeout_ms: self.request_timeout.as_millis() as u64,
                }
            } else {
                SiftError::Network {
                    url: url_str.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let status_text = status
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();
        let final_url = response.url().to_string();
        let protocol = protocol_name(response.version());

        let headers = header_map_to_lowercase(response.headers());
        let etag = headers.get("etag").cloned();
        let last_modified = headers.get("last-modified").cloned();
        let was_not_modified = status == reqwest::StatusCode::NOT_MODIFIED;

        // 304 carries no body worth reading; other error statuses surface.
        if !was_not_modified && !status.is_success() {
            if status.is_redirection() {
                // Redirect loop exhaustion lands here; surface as-is.
                debug!(url = %final_url, status = %status, "non-followed redirect");
            }
            return Err(SiftError::HttpStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length()
            && length as usize > self.max_body_bytes
        {
            return Err(SiftError::Network {
                url: final_url,
                reason: format!("response body of {length} bytes exceeds limit"),
            });
        }

        let body = if was_not_modified {
            String::new()
        } else {
            let bytes = response.bytes().await.map_err(|e| SiftError::Network {
                url: final_url.clone(),
                reason: format!("body read failed: {e}"),
            })?;
            if bytes.len() > self.max_body_bytes {
                return Err(SiftError::Network {
                    url: final_url,
                    reason: format!("response body of {} bytes exceeds limit", bytes.len()),
                });
            }
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            headers,
            body,
            final_url,
            protocol,
            duration_ms: started.elapsed().as_millis() as u64,
            etag,
            last_modified,
            was_not_modified,
        })
    }
}

fn protocol_name(version: reqwest::Version) -> String {
    match version {
        reqwest::Version::HTTP_09 => "http/0.9".to_string(),
        reqwest::Version::HTTP_10 => "http/1.0".to_string(),
        reqwest::Version::HTTP_11 => "http/1.1".to_string(),
        reqwest::Version::HTTP_2 => "h2".to_string(),
        reqwest::Version::HTTP_3 => "h3".to_string(),
        other => format!("{other:?}"),
    }
}

fn header_map_to_lowercase(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_millis(500);
        let first = retry_backoff(1, base);
        let fifth = retry_backoff(5, base);
        assert!(first >= Duration::from_millis(700) && first <= Duration::from_millis(1300));
        assert!(fifth <= Duration::from_secs(30));
        assert!(fifth > first);
    }

    #[test]
    fn protocol_names_are_lowercase_tokens() {
        assert_eq!(protocol_name(reqwest::Version::HTTP_11), "http/1.1");
        assert_eq!(protocol_name(reqwest::Version::HTTP_2), "h2");
    }
}
