//! Fluent builder for `ServiceConfig`.
//!
//! Every field has a sensible default, so the builder is purely additive:
//! `ServiceConfig::builder().user_agent("bot/1.0").build()`.

use std::time::Duration;

use super::types::ServiceConfig;

/// Compile a domain glob pattern into an anchored regex.
///
/// Converts glob patterns (where `*` matches any label sequence) into proper
/// regex patterns. Compiled once so hot paths never pay for it.
///
/// # Errors
///
/// Returns an error if the resulting regex pattern is invalid.
pub fn compile_glob_pattern(pattern: &str) -> anyhow::Result<regex::Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    let anchored = format!("^{escaped}$");
    regex::Regex::new(&anchored)
        .map_err(|e| anyhow::anyhow!("Invalid glob pattern '{pattern}': {e}"))
}

#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfig {
    /// Create a builder for configuring a `ServiceConfig` with a fluent
    /// interface.
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    #[must_use]
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry_base_delay = delay;
        self
    }

    #[must_use]
    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    #[must_use]
    pub fn rate_limit_enabled(mut self, enabled: bool) -> Self {
        self.config.rate_limit_enabled = enabled;
        self
    }

    #[must_use]
    pub fn default_refill_rps(mut self, rps: f64) -> Self {
        self.config.default_refill_rps = rps;
        self
    }

    #[must_use]
    pub fn bucket_capacity(mut self, capacity: f64) -> Self {
        self.config.bucket_capacity = capacity.max(1.0);
        self
    }

    #[must_use]
    pub fn waiter_tick(mut self, tick: Duration) -> Self {
        self.config.waiter_tick = tick;
        self
    }

    #[must_use]
    pub fn max_token_wait(mut self, wait: Duration) -> Self {
        self.config.max_token_wait = wait;
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn cache_max_entries(mut self, entries: usize) -> Self {
        self.config.cache_max_entries = entries.max(1);
        self
    }

    #[must_use]
    pub fn robots_ttl(mut self, ttl: Duration) -> Self {
        self.config.robots_ttl = ttl;
        self
    }

    /// Exempt a host from SSRF checks. Useful for tests against local
    /// fixtures; the allow-list always overrides the deny rules.
    #[must_use]
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.config.allow_hosts.push(host.into().to_lowercase());
        self
    }

    #[must_use]
    pub fn completeness_thresholds(
        mut self,
        min_paragraphs: usize,
        min_content_chars: usize,
        min_words: usize,
    ) -> Self {
        self.config.min_paragraphs = min_paragraphs;
        self.config.min_content_chars = min_content_chars;
        self.config.min_words = min_words;
        self
    }

    #[must_use]
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.config.llm_timeout = timeout;
        self
    }

    #[must_use]
    pub fn external_timeout(mut self, timeout: Duration) -> Self {
        self.config.external_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_nodes(mut self, max: usize) -> Self {
        self.config.max_nodes = max.max(1);
        self
    }

    #[must_use]
    pub fn job_concurrency(mut self, concurrency: usize) -> Self {
        self.config.job_concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn worker_tick(mut self, tick: Duration) -> Self {
        self.config.worker_tick = tick;
        self
    }

    #[must_use]
    pub fn default_job_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_job_timeout = timeout;
        self
    }

    #[must_use]
    pub fn terminal_retention(mut self, retention: usize) -> Self {
        self.config.terminal_retention = retention;
        self
    }

    #[must_use]
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        let built = ServiceConfig::builder().build();
        let default = ServiceConfig::default();
        assert_eq!(built.user_agent(), default.user_agent());
        assert_eq!(built.max_retries(), default.max_retries());
        assert_eq!(built.min_paragraphs(), default.min_paragraphs());
    }

    #[test]
    fn glob_matches_label_sequences() {
        let re = compile_glob_pattern("*.example.com").unwrap();
        assert!(re.is_match("news.example.com"));
        assert!(re.is_match("a.b.example.com"));
        assert!(!re.is_match("example.org"));

        let exact = compile_glob_pattern("example.com").unwrap();
        assert!(exact.is_match("example.com"));
        assert!(!exact.is_match("sub.example.com"));
    }

    #[test]
    fn allow_host_is_lowercased() {
        let config = ServiceConfig::builder().allow_host("LocalHost").build();
        assert_eq!(config.allow_hosts(), ["localhost"]);
    }
}
