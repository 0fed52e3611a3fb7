//! Extraction ensemble: pick the best candidate.
//!
//! Every candidate gets a composite score over content length, structure,
//! metadata completeness, text density, and the extractor's self-confidence.
//! Ties break deterministically on method priority so reruns always select
//! the same winner.

use serde::{Deserialize, Serialize};

use crate::distill::extractor::{Candidate, ExtractionMethod};

/// Composite weights: length, structure, metadata, density, self-confidence.
const WEIGHTS: [f64; 5] = [0.30, 0.25, 0.15, 0.10, 0.20];

/// Score detail for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub method: ExtractionMethod,
    pub length_score: f64,
    pub structure_score: f64,
    pub metadata_score: f64,
    pub density_score: f64,
    pub confidence_score: f64,
    pub composite: f64,
}

/// Ensemble selection outcome.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Index of the winner within the input slice.
    pub selected: usize,
    pub score: f64,
    pub explanation: String,
    pub all_scores: Vec<CandidateScore>,
}

/// Select the best candidate. Never fails; an empty slice is a programming
/// error in the distiller.
#[must_use]
pub fn select_best(candidates: &[Candidate]) -> Selection {
    assert!(
        !candidates.is_empty(),
        "ensemble invoked with no candidates"
    );

    let all_scores: Vec<CandidateScore> = candidates.iter().map(score_candidate).collect();

    let mut best = 0usize;
    for (i, score) in all_scores.iter().enumerate().skip(1) {
        let current = &all_scores[best];
        let epsilon = 1e-9;
        if score.composite > current.composite + epsilon {
            best = i;
        } else if (score.composite - current.composite).abs() <= epsilon
            && score.method.priority() < current.method.priority()
        {
            best = i;
        }
    }

    let winner = &all_scores[best];
    let explanation = format!(
        "selected {} (composite {:.3}: length {:.2}, structure {:.2}, metadata {:.2}, density {:.2}, confidence {:.2}) from {} candidate(s)",
        winner.method,
        winner.composite,
        winner.length_score,
        winner.structure_score,
        winner.metadata_score,
        winner.density_score,
        winner.confidence_score,
        candidates.len()
    );

    Selection {
        selected: best,
        score: winner.composite,
        explanation,
        all_scores,
    }
}

fn score_candidate(candidate: &Candidate) -> CandidateScore {
    let length_score = length_score(candidate.content_len());
    let structure_score = structure_score(candidate);
    let metadata_score = metadata_score(candidate);
    let density_score = density_score(candidate);
    let confidence_score = candidate.confidence.clamp(0.0, 1.0);

    let components = [
        length_score,
        structure_score,
        metadata_score,
        density_score,
        confidence_score,
    ];
    let composite = components
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(s, w)| s * w)
        .sum();

    CandidateScore {
        method: candidate.method,
        length_score,
        structure_score,
        metadata_score,
        density_score,
        confidence_score,
        composite,
    }
}

/// Saturating length score: 2000 characters is "plenty".
fn length_score(len: usize) -> f64 {
    (len as f64 / 2000.0).min(1.0)
}

/// Structure: paragraph count toward 10, plus a sane title length.
fn structure_score(candidate: &Candidate) -> f64 {
    let paragraph_part = (candidate.paragraph_count() as f64 / 10.0).min(1.0) * 0.7;
    let title_part = match candidate.title.as_deref().map(|t| t.chars().count()) {
        Some(len) if (10..=120).contains(&len) => 0.3,
        Some(len) if len > 0 => 0.15,
        _ => 0.0,
    };
    paragraph_part + title_part
}

fn metadata_score(candidate: &Candidate) -> f64 {
    let mut score = 0.0;
    if candidate.metadata.author.is_some() {
        score += 0.35;
    }
    if candidate.metadata.publish_date.is_some() {
        score += 0.35;
    }
    if candidate.metadata.excerpt.is_some() {
        score += 0.3;
    }
    score
}

/// Mean paragraph length as a proxy for prose (vs. boilerplate crumbs),
/// saturating at 400 characters.
fn density_score(candidate: &Candidate) -> f64 {
    let paragraphs = candidate.paragraph_count();
    if paragraphs == 0 {
        return 0.0;
    }
    let total: usize = candidate
        .blocks
        .iter()
        .filter(|b| !b.heading)
        .map(|b| b.text.chars().count())
        .sum();
    ((total as f64 / paragraphs as f64) / 400.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distill::extractor::{CandidateBlock, CandidateMetadata};

    fn candidate(method: ExtractionMethod, paragraphs: usize, chars_each: usize) -> Candidate {
        Candidate {
            method,
            title: Some("A reasonable article title".into()),
            blocks: (0..paragraphs)
                .map(|_| CandidateBlock {
                    text: "y".repeat(chars_each),
                    heading: false,
                    selector: None,
                })
                .collect(),
            confidence: 0.7,
            metadata: CandidateMetadata::default(),
        }
    }

    #[test]
    fn richer_candidate_wins() {
        let rich = candidate(ExtractionMethod::Readability, 8, 250);
        let poor = candidate(ExtractionMethod::DomHeuristic, 2, 40);
        let selection = select_best(&[poor, rich]);
        assert_eq!(selection.selected, 1);
        assert!(selection.score > 0.4);
    }

    #[test]
    fn ties_break_on_method_priority() {
        let a = candidate(ExtractionMethod::DomHeuristic, 5, 100);
        let b = candidate(ExtractionMethod::Readability, 5, 100);
        // Identical content, so composite scores tie exactly.
        let selection = select_best(&[a, b]);
        assert_eq!(selection.selected, 1, "readability outranks dom-heuristic");

        let c = candidate(ExtractionMethod::Readability, 5, 100);
        let d = candidate(ExtractionMethod::DomainAdapter, 5, 100);
        let selection = select_best(&[c, d]);
        assert_eq!(selection.selected, 1, "domain-adapter outranks readability");
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates = vec![
            candidate(ExtractionMethod::DomHeuristic, 4, 120),
            candidate(ExtractionMethod::Readability, 6, 180),
            candidate(ExtractionMethod::Llm, 6, 180),
        ];
        let first = select_best(&candidates).selected;
        for _ in 0..10 {
            assert_eq!(select_best(&candidates).selected, first);
        }
    }

    #[test]
    #[should_panic(expected = "no candidates")]
    fn empty_input_is_a_programming_error() {
        let _ = select_best(&[]);
    }
}
