//! Domain policy engine: pre-extraction HTML surgery.
//!
//! A policy is selected per URL (exact hint, then domain glob, then the
//! `default` policy) and applies DROP rules (remove matching elements or
//! text), KEEP rules (reduce the body to the matched subtrees), and regex
//! transforms. Policy failures never abort distillation: every error path
//! logs a warning and passes the HTML through unchanged.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::compile_glob_pattern;
use crate::utils::host_of;

/// One keep/drop rule: element selector or text regex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Regex find/replace applied to the serialized HTML after keep/drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRule {
    pub regex: String,
    #[serde(default)]
    pub replacement: String,
}

/// Field selectors a policy promises the page will satisfy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl PolicyFields {
    fn entries(&self) -> Vec<(&'static str, &String)> {
        [
            ("title", self.title.as_ref()),
            ("author", self.author.as_ref()),
            ("main", self.main.as_ref()),
            ("excerpt", self.excerpt.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, sel)| sel.map(|s| (name, s)))
        .collect()
    }
}

/// A named pre-processing policy bound to a domain glob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    /// Domain glob; `*` matches any label sequence.
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default)]
    pub keep: Vec<PolicyRule>,
    #[serde(default)]
    pub drop: Vec<PolicyRule>,
    #[serde(default)]
    pub transform: Vec<TransformRule>,
    #[serde(default)]
    pub fields: PolicyFields,
}

/// What the engine did to the HTML.
#[derive(Debug, Clone)]
pub struct PolicyOutcome {
    pub transformed_html: String,
    pub policy_applied: Option<String>,
    pub rules_matched: usize,
    pub fields_validated: bool,
    pub validation_errors: Vec<String>,
}

impl PolicyOutcome {
    fn passthrough(html: &str) -> Self {
        Self {
            transformed_html: html.to_string(),
            policy_applied: None,
            rules_matched: 0,
            fields_validated: true,
            validation_errors: Vec::new(),
        }
    }
}

struct CompiledPolicy {
    policy: Policy,
    domain_re: Option<regex::Regex>,
}

/// Selects and applies policies. Construction compiles the domain globs
/// once; rule selectors and regexes are compiled per application since
/// policies are small and pages are not.
pub struct PolicyEngine {
    policies: Vec<CompiledPolicy>,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(policies: Vec<Policy>) -> Self {
        let compiled = policies
            .into_iter()
            .map(|policy| {
                let domain_re = match compile_glob_pattern(&policy.domain) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(policy = %policy.name, error = %e, "invalid policy domain glob");
                        None
                    }
                };
                CompiledPolicy { policy, domain_re }
            })
            .collect();
        Self { policies: compiled }
    }

    /// Engine with no policies; every application passes through.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Select a policy: exact `hint` name first, then domain glob, then the
    /// policy literally named `default`.
    fn select(&self, url: &str, hint: Option<&str>) -> Option<&Policy> {
        if let Some(hint) = hint
            && let Some(found) = self.policies.iter().find(|c| c.policy.name == hint)
        {
            return Some(&found.policy);
        }
        if let Ok(host) = host_of(url)
            && let Some(found) = self.policies.iter().find(|c| {
                c.domain_re.as_ref().is_some_and(|re| re.is_match(&host))
                    && c.policy.name != "default"
            })
        {
            return Some(&found.policy);
        }
        self.policies
            .iter()
            .find(|c| c.policy.name == "default")
            .map(|c| &c.policy)
    }

    /// Apply the selected policy to the HTML. Never fails: every error path
    /// degrades to pass-through.
    #[must_use]
    pub fn apply(&self, html: &str, url: &str, hint: Option<&str>) -> PolicyOutcome {
        let Some(policy) = self.select(url, hint) else {
            return PolicyOutcome::passthrough(html);
        };

        match apply_policy(policy, html) {
            Ok(mut outcome) => {
                outcome.policy_applied = Some(policy.name.clone());
                debug!(
                    policy = %policy.name,
                    rules = outcome.rules_matched,
                    "policy applied"
                );
                outcome
            }
            Err(e) => {
                warn!(policy = %policy.name, url, error = %e, "policy failed, passing HTML through");
                PolicyOutcome::passthrough(html)
            }
        }
    }
}

fn apply_policy(policy: &Policy, html: &str) -> anyhow::Result<PolicyOutcome> {
    let mut doc = Html::parse_document(html);
    let mut rules_matched = 0usize;

    // DROP pass: remove elements by selector, text nodes by regex.
    for rule in &policy.drop {
        if let Some(selector) = &rule.selector {
            let Ok(parsed) = Selector::parse(selector) else {
                warn!(policy = %policy.name, selector, "unparseable drop selector, skipping rule");
                continue;
            };
            let ids: Vec<ego_tree::NodeId> = doc.select(&parsed).map(|el| el.id()).collect();
            if !ids.is_empty() {
                rules_matched += 1;
            }
            for id in ids {
                if let Some(mut node) = doc.tree.get_mut(id) {
                    node.detach();
                }
            }
        }
        if let Some(pattern) = &rule.regex {
            let Ok(re) = regex::Regex::new(pattern) else {
                warn!(policy = %policy.name, pattern, "unparseable drop regex, skipping rule");
                continue;
            };
            let ids: Vec<_> = doc
                .tree
                .nodes()
                .filter(|node| {
                    node.value()
                        .as_text()
                        .is_some_and(|text| re.is_match(text))
                })
                .map(|node| node.id())
                .collect();
            if !ids.is_empty() {
                rules_matched += 1;
            }
            for id in ids {
                if let Some(mut node) = doc.tree.get_mut(id) {
                    node.detach();
                }
            }
        }
    }

    // KEEP pass: if any keep selector matches, the body becomes the
    // concatenation of the matched subtrees.
    let mut kept_fragments: Vec<String> = Vec::new();
    for rule in &policy.keep {
        let Some(selector) = &rule.selector else {
            continue;
        };
        let Ok(parsed) = Selector::parse(selector) else {
            warn!(policy = %policy.name, selector, "unparseable keep selector, skipping rule");
            continue;
        };
        let fragments: Vec<String> = doc.select(&parsed).map(|el| el.html()).collect();
        if !fragments.is_empty() {
            rules_matched += 1;
            kept_fragments.extend(fragments);
        }
    }

    let mut output = if kept_fragments.is_empty() {
        doc.html()
    } else {
        let head = extract_head(&doc);
        format!(
            "<html>{head}<body>{}</body></html>",
            kept_fragments.concat()
        )
    };

    // Transform pass: regex rewrites on the serialized HTML.
    for rule in &policy.transform {
        let Ok(re) = regex::Regex::new(&rule.regex) else {
            warn!(policy = %policy.name, pattern = %rule.regex, "unparseable transform regex, skipping rule");
            continue;
        };
        if re.is_match(&output) {
            rules_matched += 1;
            output = re.replace_all(&output, rule.replacement.as_str()).into_owned();
        }
    }

    // Field validation: a read-only diagnostic against the transformed HTML.
    let mut validation_errors = Vec::new();
    let transformed_doc = Html::parse_document(&output);
    for (field, selector) in policy.fields.entries() {
        match Selector::parse(selector) {
            Ok(parsed) => {
                if transformed_doc.select(&parsed).next().is_none() {
                    validation_errors.push(format!("field '{field}' matched nothing: {selector}"));
                }
            }
            Err(_) => {
                validation_errors.push(format!("field '{field}' selector unparseable: {selector}"));
            }
        }
    }

    Ok(PolicyOutcome {
        transformed_html: output,
        policy_applied: None,
        rules_matched,
        fields_validated: validation_errors.is_empty(),
        validation_errors,
    })
}

fn extract_head(doc: &Html) -> String {
    Selector::parse("head")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .map(|el| el.html())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(vec![
            Policy {
                name: "news".to_string(),
                domain: "*.news.example".to_string(),
                drop: vec![
                    PolicyRule {
                        selector: Some("nav".to_string()),
                        ..Default::default()
                    },
                    PolicyRule {
                        regex: Some(r"(?i)subscribe now".to_string()),
                        ..Default::default()
                    },
                ],
                keep: vec![PolicyRule {
                    selector: Some("article".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            Policy {
                name: "default".to_string(),
                domain: "*".to_string(),
                ..Default::default()
            },
        ])
    }

    const PAGE: &str = r#"<html><head><title>T</title></head><body>
        <nav>menu</nav>
        <article><p>Real content.</p><p>Subscribe now!</p></article>
        <footer>foot</footer>
    </body></html>"#;

    #[test]
    fn drop_and_keep_rules_apply_by_domain() {
        let outcome = engine().apply(PAGE, "https://www.news.example/story", None);
        assert_eq!(outcome.policy_applied.as_deref(), Some("news"));
        assert!(!outcome.transformed_html.contains("menu"));
        assert!(!outcome.transformed_html.contains("Subscribe now"));
        assert!(!outcome.transformed_html.contains("foot"));
        assert!(outcome.transformed_html.contains("Real content."));
        assert!(outcome.rules_matched >= 2);
    }

    #[test]
    fn hint_overrides_domain_matching() {
        let outcome = engine().apply(PAGE, "https://unrelated.example/x", Some("news"));
        assert_eq!(outcome.policy_applied.as_deref(), Some("news"));
    }

    #[test]
    fn default_policy_is_a_passthrough_here() {
        let outcome = engine().apply(PAGE, "https://other.example/x", None);
        assert_eq!(outcome.policy_applied.as_deref(), Some("default"));
        assert!(outcome.transformed_html.contains("menu"));
    }

    #[test]
    fn bad_selectors_never_abort() {
        let engine = PolicyEngine::new(vec![Policy {
            name: "broken".to_string(),
            domain: "*".to_string(),
            drop: vec![PolicyRule {
                selector: Some(":::not-a-selector".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }]);
        let outcome = engine.apply(PAGE, "https://any.example/x", None);
        assert!(outcome.transformed_html.contains("Real content."));
    }

    #[test]
    fn field_validation_reports_misses() {
        let engine = PolicyEngine::new(vec![Policy {
            name: "default".to_string(),
            domain: "*".to_string(),
            fields: PolicyFields {
                title: Some("title".to_string()),
                author: Some(".byline".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }]);
        let outcome = engine.apply(PAGE, "https://x.example/", None);
        assert!(!outcome.fields_validated);
        assert_eq!(outcome.validation_errors.len(), 1);
    }
}
