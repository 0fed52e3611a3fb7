//! Five-dimensional Bayesian confidence scoring.
//!
//! Each component lands in `[0, 1]`, is clamped away from the poles,
//! converted to log-odds, combined as a weighted sum, and converted back to
//! a probability. The weighting favors what the extractor itself reported
//! and the measurable content quality over softer signals.

use serde::{Deserialize, Serialize};

use crate::distill::extractor::Candidate;
use crate::utils::{host_of, jaccard_words};

/// Component weights: extraction, content quality, metadata, source
/// credibility, consensus.
const WEIGHTS: [f64; 5] = [0.30, 0.25, 0.15, 0.10, 0.20];

/// Prior used when the extractor reports no self-confidence.
const EXTRACTION_PRIOR: f64 = 0.7;

/// Prior consensus when there is at most one candidate to compare.
const CONSENSUS_PRIOR: f64 = 0.5;

/// Hosts treated as highly credible sources.
const KNOWN_GOOD_HOSTS: &[(&str, f64)] = &[
    ("wikipedia.org", 0.9),
    ("arxiv.org", 0.9),
    ("github.com", 0.85),
    ("reuters.com", 0.9),
    ("apnews.com", 0.9),
    ("bbc.co.uk", 0.85),
    ("bbc.com", 0.85),
    ("nytimes.com", 0.85),
    ("nature.com", 0.9),
];

/// Per-component breakdown reported alongside the overall score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBreakdown {
    pub extraction: f64,
    pub content_quality: f64,
    pub metadata: f64,
    pub source_credibility: f64,
    pub consensus: f64,
    pub overall: f64,
}

/// Score a selected candidate against its peers.
#[must_use]
pub fn score(selected: &Candidate, all_candidates: &[Candidate], url: &str) -> ConfidenceBreakdown {
    let extraction = if selected.confidence > 0.0 {
        selected.confidence
    } else {
        EXTRACTION_PRIOR
    };
    let content_quality = content_quality(selected);
    let metadata = metadata_score(selected);
    let source_credibility = source_credibility(url);
    let consensus = consensus_score(all_candidates);

    let components = [
        extraction,
        content_quality,
        metadata,
        source_credibility,
        consensus,
    ];
    let overall = combine(&components).clamp(0.1, 0.98);

    ConfidenceBreakdown {
        extraction,
        content_quality,
        metadata,
        source_credibility,
        consensus,
        overall,
    }
}

/// Piecewise content-quality score: up to 0.5 for length in the optimal
/// 300–3000 character window, up to 0.5 for 3–20 paragraphs.
fn content_quality(candidate: &Candidate) -> f64 {
    let len = candidate.content_len();
    let length_score = if (300..=3000).contains(&len) {
        0.5
    } else if len < 300 {
        0.5 * len as f64 / 300.0
    } else {
        (0.5 - (len as f64 - 3000.0) / 20_000.0).max(0.3)
    };

    let paragraphs = candidate.paragraph_count();
    let paragraph_score = if (3..=20).contains(&paragraphs) {
        0.5
    } else if paragraphs < 3 {
        0.5 * paragraphs as f64 / 3.0
    } else {
        (0.5 - (paragraphs as f64 - 20.0) / 100.0).max(0.3)
    };

    (length_score + paragraph_score).clamp(0.0, 1.0)
}

/// Weighted presence of title, author, publish date, and excerpt.
fn metadata_score(candidate: &Candidate) -> f64 {
    let mut score = 0.0;
    if candidate.title.as_deref().is_some_and(|t| !t.is_empty()) {
        score += 0.4;
    }
    if candidate.metadata.author.is_some() {
        score += 0.2;
    }
    if candidate.metadata.publish_date.is_some() {
        score += 0.2;
    }
    if candidate.metadata.excerpt.is_some() {
        score += 0.2;
    }
    score
}

/// Host-based credibility heuristic.
fn source_credibility(url: &str) -> f64 {
    let Ok(host) = host_of(url) else {
        return 0.5;
    };
    for (known, value) in KNOWN_GOOD_HOSTS {
        if host == *known || host.ends_with(&format!(".{known}")) {
            return *value;
        }
    }
    if host.ends_with(".edu") || host.ends_with(".gov") {
        return 0.85;
    }
    0.5
}

/// Agreement across candidates: title similarity plus variance-based
/// agreement on length and self-confidence.
fn consensus_score(candidates: &[Candidate]) -> f64 {
    if candidates.len() <= 1 {
        return CONSENSUS_PRIOR;
    }

    let titles: Vec<&str> = candidates
        .iter()
        .filter_map(|c| c.title.as_deref())
        .collect();
    let title_similarity = if titles.len() < 2 {
        CONSENSUS_PRIOR
    } else {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..titles.len() {
            for j in (i + 1)..titles.len() {
                total += jaccard_words(titles[i], titles[j]);
                pairs += 1;
            }
        }
        total / pairs as f64
    };

    let lengths: Vec<f64> = candidates.iter().map(|c| c.content_len() as f64).collect();
    let length_agreement = 1.0 / (1.0 + variance(&lengths) / 250_000.0);

    let scores: Vec<f64> = candidates.iter().map(|c| c.confidence).collect();
    let score_agreement = 1.0 / (1.0 + variance(&scores) / 0.05);

    0.4 * title_similarity + 0.3 * length_agreement + 0.3 * score_agreement
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// Weighted log-odds combination. Components are clamped to `[0.01, 0.99]`
/// so a zero never dominates the sum.
fn combine(components: &[f64; 5]) -> f64 {
    let weighted: f64 = components
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(p, w)| {
            let p = p.clamp(0.01, 0.99);
            w * (p / (1.0 - p)).ln()
        })
        .sum();
    1.0 / (1.0 + (-weighted).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distill::extractor::{CandidateBlock, CandidateMetadata, ExtractionMethod};

    fn candidate(confidence: f64, paragraphs: usize, chars_each: usize) -> Candidate {
        Candidate {
            method: ExtractionMethod::Readability,
            title: Some("The Common Title Here".into()),
            blocks: (0..paragraphs)
                .map(|_| CandidateBlock {
                    text: "x".repeat(chars_each),
                    heading: false,
                    selector: None,
                })
                .collect(),
            confidence,
            metadata: CandidateMetadata {
                author: Some("Writer".into()),
                publish_date: Some("2025-01-01".into()),
                excerpt: Some("Summary".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn overall_stays_in_bounds() {
        let good = candidate(0.95, 8, 200);
        let breakdown = score(&good, std::slice::from_ref(&good), "https://example.com/a");
        assert!(breakdown.overall >= 0.1 && breakdown.overall <= 0.98);

        let awful = Candidate {
            method: ExtractionMethod::Fallback,
            title: None,
            blocks: vec![],
            confidence: 0.01,
            metadata: CandidateMetadata::default(),
        };
        let breakdown = score(&awful, std::slice::from_ref(&awful), "not a url");
        assert!(breakdown.overall >= 0.1);
    }

    #[test]
    fn single_candidate_uses_consensus_prior() {
        let one = candidate(0.8, 5, 150);
        let breakdown = score(&one, std::slice::from_ref(&one), "https://example.com/");
        assert!((breakdown.consensus - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn agreeing_candidates_raise_consensus() {
        let a = candidate(0.8, 5, 150);
        let b = candidate(0.78, 5, 155);
        let disagreeing = candidate(0.2, 1, 20);

        let agree = score(&a, &[a.clone(), b.clone()], "https://example.com/");
        let disagree = score(&a, &[a.clone(), disagreeing], "https://example.com/");
        assert!(agree.consensus > disagree.consensus);
    }

    #[test]
    fn edu_and_known_hosts_score_high() {
        let c = candidate(0.8, 5, 150);
        let edu = score(&c, std::slice::from_ref(&c), "https://cs.stanford.edu/x");
        let wiki = score(&c, std::slice::from_ref(&c), "https://en.wikipedia.org/wiki/X");
        let blog = score(&c, std::slice::from_ref(&c), "https://some-blog.example/");
        assert!((edu.source_credibility - 0.85).abs() < f64::EPSILON);
        assert!((wiki.source_credibility - 0.9).abs() < f64::EPSILON);
        assert!((blog.source_credibility - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn content_quality_prefers_the_optimal_window() {
        let in_window = candidate(0.8, 6, 200);
        let too_short = candidate(0.8, 1, 30);
        let a = score(&in_window, std::slice::from_ref(&in_window), "https://x.example/");
        let b = score(&too_short, std::slice::from_ref(&too_short), "https://x.example/");
        assert!(a.content_quality > b.content_quality);
        assert!((a.content_quality - 1.0).abs() < f64::EPSILON);
    }
}
