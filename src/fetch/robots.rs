//! robots.txt fetching, caching, and evaluation.
//!
//! One parsed rule set is cached per origin with a TTL. Evaluation follows
//! the usual longest-match convention: among all matching Allow/Disallow
//! rules for the most specific user-agent group, the longest pattern wins,
//! with Allow winning ties. Fetch failures degrade to allow-all: a missing
//! robots.txt (or an unreachable server) never blocks fetching, a 5xx is
//! remembered only briefly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::SiftResult;
use crate::utils::origin_of;

/// A single Allow/Disallow rule.
#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    allow: bool,
}

/// Rules for one user-agent group plus its crawl delay.
#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

/// Parsed robots.txt for a single origin.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<Group>,
}

impl RobotsRules {
    /// Parse robots.txt text. Unknown directives are skipped; parsing never
    /// fails.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;
        // A User-agent line following rules starts a new group; consecutive
        // User-agent lines share one group.
        let mut last_was_agent = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !last_was_agent {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(Group::default());
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                    last_was_agent = true;
                }
                "allow" | "disallow" => {
                    last_was_agent = false;
                    if let Some(group) = current.as_mut() {
                        // An empty Disallow means allow-all; no rule needed.
                        if !value.is_empty() {
                            group.rules.push(Rule {
                                pattern: value.to_string(),
                                allow: key == "allow",
                            });
                        }
                    }
                }
                "crawl-delay" => {
                    last_was_agent = false;
                    if let (Some(group), Ok(delay)) = (current.as_mut(), value.parse::<f64>()) {
                        group.crawl_delay = Some(delay);
                    }
                }
                _ => {
                    last_was_agent = false;
                }
            }
        }
        if let Some(group) = current.take() {
            groups.push(group);
        }
        Self { groups }
    }

    /// Whether `path` is allowed for `user_agent`.
    #[must_use]
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };
        let mut best: Option<(&Rule, usize)> = None;
        for rule in &group.rules {
            if let Some(len) = match_len(&rule.pattern, path) {
                let better = match best {
                    Some((current, current_len)) => {
                        len > current_len || (len == current_len && rule.allow && !current.allow)
                    }
                    None => true,
                };
                if better {
                    best = Some((rule, len));
                }
            }
        }
        best.is_none_or(|(rule, _)| rule.allow)
    }

    /// Crawl delay in seconds for `user_agent`, if declared.
    #[must_use]
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.group_for(user_agent).and_then(|g| g.crawl_delay)
    }

    /// Most specific matching group: exact substring match on the agent
    /// token beats the `*` group.
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_ascii_lowercase();
        let mut wildcard = None;
        for group in &self.groups {
            for agent in &group.agents {
                if agent == "*" {
                    wildcard.get_or_insert(group);
                } else if ua.contains(agent.as_str()) {
                    return Some(group);
                }
            }
        }
        wildcard
    }
}

/// Match a robots pattern (supporting `*` and a trailing `$` anchor) against
/// a path. Returns the pattern length as specificity, or `None` on miss.
fn match_len(pattern: &str, path: &str) -> Option<usize> {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !path.starts_with(part) {
                return None;
            }
            pos = part.len();
        } else {
            match path[pos..].find(part) {
                Some(offset) => pos = pos + offset + part.len(),
                None => return None,
            }
        }
    }
    if anchored {
        // With a trailing `*` the anchor is trivially satisfied.
        let ends_open = pattern.ends_with('*');
        if !ends_open && pos != path.len() {
            return None;
        }
    }
    Some(pattern.len())
}

#[derive(Debug)]
struct CachedRules {
    rules: RobotsRules,
    fetched_at: Instant,
    ttl: Duration,
}

/// Fetches and caches robots.txt per origin; answers allow/deny.
#[derive(Debug, Clone)]
pub struct RobotsManager {
    client: reqwest::Client,
    validator: crate::fetch::ssrf::UrlValidator,
    cache: Arc<DashMap<String, Arc<CachedRules>>>,
    user_agent: String,
    ttl: Duration,
    request_timeout: Duration,
}

impl RobotsManager {
    #[must_use]
    pub fn new(config: &ServiceConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            validator: crate::fetch::ssrf::UrlValidator::new(config),
            cache: Arc::new(DashMap::new()),
            user_agent: config.user_agent().to_string(),
            ttl: config.robots_ttl(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Whether fetching `url` is allowed for the configured user agent.
    ///
    /// # Errors
    ///
    /// Only URL parse failures error; robots fetch problems degrade to
    /// allow-all.
    pub async fn is_allowed(&self, url: &str) -> SiftResult<bool> {
        let rules = self.rules_for(url).await?;
        let parsed = url::Url::parse(url).map_err(|e| crate::error::SiftError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(rules.is_allowed(&path, &self.user_agent))
    }

    /// Crawl delay declared for our user agent on this URL's origin.
    pub async fn crawl_delay(&self, url: &str) -> SiftResult<Option<f64>> {
        let rules = self.rules_for(url).await?;
        Ok(rules.crawl_delay(&self.user_agent))
    }

    async fn rules_for(&self, url: &str) -> SiftResult<RobotsRules> {
        let origin = origin_of(url)?;

        if let Some(cached) = self.cache.get(&origin)
            && cached.fetched_at.elapsed() < cached.ttl
        {
            return Ok(cached.rules.clone());
        }

        let (rules, ttl) = self.fetch_rules(&origin).await;
        self.cache.insert(
            origin,
            Arc::new(CachedRules {
                rules: rules.clone(),
                fetched_at: Instant::now(),
                ttl,
            }),
        );
        Ok(rules)
    }

    /// Fetch and parse `{origin}/robots.txt`. 4xx means "no robots" (cached
    /// for the full TTL); transport errors and 5xx allow-all with a short
    /// TTL so a flapping server is retried soon.
    async fn fetch_rules(&self, origin: &str) -> (RobotsRules, Duration) {
        let robots_url = format!("{origin}/robots.txt");

        // robots.txt is an outbound fetch like any other: no socket opens to
        // an origin the SSRF guard refuses. The page fetch itself will fail
        // validation; the robots answer degrades to allow-all.
        if let Err(e) = self.validator.validate(&robots_url).await {
            debug!(origin, error = %e, "robots origin not fetchable, allowing all briefly");
            return (RobotsRules::default(), Duration::from_secs(60));
        }

        let response = self
            .client
            .get(&robots_url)
            .timeout(self.request_timeout)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    debug!(origin, "robots.txt fetched and parsed");
                    (RobotsRules::parse(&body), self.ttl)
                }
                Err(e) => {
                    warn!(origin, error = %e, "robots.txt body read failed, allowing all");
                    (RobotsRules::default(), Duration::from_secs(60))
                }
            },
            Ok(resp) if resp.status().is_client_error() => {
                debug!(origin, status = %resp.status(), "no robots.txt, allowing all");
                (RobotsRules::default(), self.ttl)
            }
            Ok(resp) => {
                warn!(origin, status = %resp.status(), "robots.txt server error, allowing all briefly");
                (RobotsRules::default(), Duration::from_secs(60))
            }
            Err(e) => {
                warn!(origin, error = %e, "robots.txt fetch failed, allowing all briefly");
                (RobotsRules::default(), Duration::from_secs(60))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# example robots
User-agent: *
Disallow: /private/
Allow: /private/ok
Crawl-delay: 2

User-agent: sift
Disallow: /only-for-others/
";

    #[test]
    fn parses_groups_and_delay() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(rules.is_allowed("/public", "somebot"));
        assert!(!rules.is_allowed("/private/secret", "somebot"));
        assert_eq!(rules.crawl_delay("somebot"), Some(2.0));
    }

    #[test]
    fn longest_match_wins_and_allow_breaks_ties() {
        let rules = RobotsRules::parse(SAMPLE);
        // /private/ok matches both rules; the longer Allow wins.
        assert!(rules.is_allowed("/private/ok", "somebot"));
    }

    #[test]
    fn specific_agent_group_beats_wildcard() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(!rules.is_allowed("/only-for-others/x", "pagesift/0.3"));
        // The sift group has no /private rule, so it is allowed there.
        assert!(rules.is_allowed("/private/secret", "pagesift/0.3"));
    }

    #[test]
    fn wildcard_and_anchor_patterns() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /*.pdf$\nDisallow: /tmp*\n");
        assert!(!rules.is_allowed("/docs/file.pdf", "bot"));
        assert!(rules.is_allowed("/docs/file.pdfx", "bot"));
        assert!(!rules.is_allowed("/tmp/scratch", "bot"));
    }

    #[test]
    fn empty_robots_allows_everything() {
        let rules = RobotsRules::parse("");
        assert!(rules.is_allowed("/anything", "bot"));
        assert_eq!(rules.crawl_delay("bot"), None);
    }
}
