//! Text helpers shared by the extractors, scorers, and token accounting.

use crate::utils::constants::CHARS_PER_TOKEN;

/// Collapse runs of whitespace into single spaces and trim the ends.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_ws = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            in_ws = true;
        } else {
            if in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = false;
            out.push(ch);
        }
    }
    out
}

/// Count whitespace-delimited words.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Approximate token count used for savings accounting.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Jaccard similarity over whitespace-tokenized words longer than two
/// characters, case-insensitive. Returns 1.0 when both token sets are empty.
#[must_use]
pub fn jaccard_words(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<String> = significant_words(a);
    let set_b: std::collections::HashSet<String> = significant_words(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn significant_words(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Truncate to at most `max_chars` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Decode HTML entities and collapse whitespace in one pass.
#[must_use]
pub fn clean_fragment(raw: &str) -> String {
    collapse_whitespace(&html_escape::decode_html_entities(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_interior_whitespace() {
        assert_eq!(collapse_whitespace("  Hello \n\t World  "), "Hello World");
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn jaccard_ignores_short_words() {
        // "a" and "of" are below the length threshold on both sides.
        let sim = jaccard_words("a tale of cities", "of a tale regarding cities");
        assert!(sim > 0.3 && sim < 1.0);
        assert_eq!(jaccard_words("same title here", "same title here"), 1.0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
