//! URL normalization and host extraction.
//!
//! Normalized URLs are the identity used for dedup, cache keys, and the
//! crawler's visited set: scheme and host lowercased, fragment stripped,
//! query pairs sorted by key, trailing slash removed on non-root paths.

use url::Url;

use crate::error::{SiftError, SiftResult};

/// Parse and normalize a URL string.
///
/// Normalization is idempotent: `normalize(normalize(u)) == normalize(u)`.
///
/// # Errors
///
/// Returns `InvalidUrl` when the input cannot be parsed or its scheme is not
/// http(s).
pub fn normalize_url(raw: &str) -> SiftResult<String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| SiftError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SiftError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    url.set_fragment(None);

    // Sort query pairs by key (then value for pairs sharing a key) so that
    // equivalent URLs serialize identically.
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        let query = pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    urlencoding::encode(k).into_owned()
                } else {
                    format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    // Trailing slash is insignificant except on the root path.
    if url.path() != "/" && url.path().ends_with('/') {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    Ok(url.to_string())
}

/// Extract the lowercased host from a URL string.
pub fn host_of(url: &str) -> SiftResult<String> {
    let parsed = Url::parse(url).map_err(|e| SiftError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| SiftError::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        })
}

/// Origin (`scheme://host[:port]`) of a URL, used for robots and sitemaps.
pub fn origin_of(url: &str) -> SiftResult<String> {
    let parsed = Url::parse(url).map_err(|e| SiftError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(parsed.origin().ascii_serialization())
}

/// Resolve a possibly-relative href against a base URL, returning the
/// normalized absolute form.
pub fn resolve_and_normalize(base: &str, href: &str) -> SiftResult<String> {
    let base_url = Url::parse(base).map_err(|e| SiftError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    let joined = base_url.join(href).map_err(|e| SiftError::InvalidUrl {
        url: href.to_string(),
        reason: e.to_string(),
    })?;
    normalize_url(joined.as_str())
}
