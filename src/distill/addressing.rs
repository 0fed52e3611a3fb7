//! Deterministic HTML canonicalization and content-addressed fingerprints.
//!
//! Canonicalization collapses insignificant syntactic variation (comments,
//! script/style bodies, whitespace, tag-name case) so semantically identical
//! inputs hash identically. The fingerprint is SHA-256 over the canonical
//! form concatenated with a stable JSON rendering of the metadata, formatted
//! as `"sha256:" + 64 lowercase hex`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::collapse_whitespace;

lazy_static! {
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").expect("static regex");
    static ref SCRIPT_RE: Regex =
        Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("static regex");
    static ref STYLE_RE: Regex =
        Regex::new(r"(?is)<style\b[^>]*>.*?</style>").expect("static regex");
    static ref TAG_NAME_RE: Regex = Regex::new(r"</?[A-Za-z][A-Za-z0-9-]*").expect("static regex");
    static ref WS_BEFORE_BRACKET_RE: Regex = Regex::new(r"\s+<").expect("static regex");
    static ref WS_AFTER_BRACKET_RE: Regex = Regex::new(r">\s+").expect("static regex");
    static ref FINGERPRINT_RE: Regex = Regex::new(r"^sha256:[a-f0-9]{64}$").expect("static regex");
}

/// Metadata mixed into the fingerprint so the same bytes at different URLs
/// address differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressMeta {
    pub url: String,
    pub content_type: String,
}

impl AddressMeta {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: "text/html".to_string(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Stable JSON: fixed key order, so the digest never depends on map
    /// iteration order.
    fn stable_json(&self) -> String {
        format!(
            r#"{{"contentType":{},"url":{}}}"#,
            serde_json::to_string(&self.content_type).unwrap_or_else(|_| "\"\"".to_string()),
            serde_json::to_string(&self.url).unwrap_or_else(|_| "\"\"".to_string()),
        )
    }
}

/// Canonicalize HTML. Idempotent: applying it twice gives the same string.
#[must_use]
pub fn canonicalize(html: &str) -> String {
    let no_comments = COMMENT_RE.replace_all(html, "");
    let no_scripts = SCRIPT_RE.replace_all(&no_comments, " ");
    let no_styles = STYLE_RE.replace_all(&no_scripts, " ");
    let lowered = TAG_NAME_RE.replace_all(&no_styles, |caps: &regex::Captures<'_>| {
        caps[0].to_lowercase()
    });
    let collapsed = collapse_whitespace(&lowered);
    let tight_open = WS_BEFORE_BRACKET_RE.replace_all(&collapsed, "<");
    let tight_close = WS_AFTER_BRACKET_RE.replace_all(&tight_open, ">");
    tight_close.into_owned()
}

/// Fingerprint of HTML plus metadata: `sha256:<hex>`.
#[must_use]
pub fn fingerprint(html: &str, meta: &AddressMeta) -> String {
    let canonical = canonicalize(html);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(meta.stable_json().as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Verify that content+metadata hash to `expected`.
#[must_use]
pub fn verify(html: &str, meta: &AddressMeta, expected: &str) -> bool {
    is_valid_fingerprint(expected) && fingerprint(html, meta) == expected
}

/// Whether a string has the `sha256:` + 64 lowercase hex shape. Any other
/// shape must be rejected by validators.
#[must_use]
pub fn is_valid_fingerprint(candidate: &str) -> bool {
    FINGERPRINT_RE.is_match(candidate)
}

/// Bare SHA-256 digest of arbitrary bytes in the same string format, used
/// for body checksums and per-node hashes.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
