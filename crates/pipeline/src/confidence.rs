//! Confidence assessment
//!
//! Derives a coarse {high, medium, low} label for an accepted answer from
//! retrieval scores and hedging language in the answer text.

use docassist_common::models::{Confidence, RetrievedChunk};

/// Hedging phrases that signal the model itself is unsure of the answer.
///
/// Process-wide constant configuration; matched as case-insensitive
/// substrings.
pub const HEDGING_PHRASES: &[&str] = &["might", "possibly", "perhaps", "unclear", "not sure"];

/// Assess confidence from retrieval scores and answer content.
///
/// No retrieved chunks is always `Low`. Otherwise the mean similarity
/// score drives the label, with any hedging phrase in the answer
/// disqualifying `High`. Thresholds are strict (`>`), not inclusive.
pub fn assess_confidence(answer: &str, chunks: &[RetrievedChunk]) -> Confidence {
    if chunks.is_empty() {
        return Confidence::Low;
    }

    let avg_score = chunks.iter().map(|c| c.score).sum::<f32>() / chunks.len() as f32;

    let answer_lower = answer.to_lowercase();
    let has_uncertainty = HEDGING_PHRASES
        .iter()
        .any(|phrase| answer_lower.contains(phrase));

    if avg_score > 0.8 && !has_uncertainty {
        Confidence::High
    } else if avg_score > 0.6 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docassist_common::models::DocumentMetadata;

    fn chunks_with_scores(scores: &[f32]) -> Vec<RetrievedChunk> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| RetrievedChunk {
                id: format!("doc_{i}"),
                doc_id: "doc".into(),
                chunk_id: i,
                text: format!("chunk {i}"),
                score: *score,
                document: DocumentMetadata::default(),
            })
            .collect()
    }

    #[test]
    fn test_no_chunks_is_low() {
        assert_eq!(assess_confidence("A solid answer.", &[]), Confidence::Low);
    }

    #[test]
    fn test_high_scores_without_hedging_are_high() {
        let chunks = chunks_with_scores(&[0.9, 0.85]);
        assert_eq!(
            assess_confidence("The revenue grew 10% last quarter.", &chunks),
            Confidence::High
        );
    }

    #[test]
    fn test_middling_scores_are_medium() {
        let chunks = chunks_with_scores(&[0.7, 0.65]);
        assert_eq!(
            assess_confidence("The revenue grew 10% last quarter.", &chunks),
            Confidence::Medium
        );
    }

    #[test]
    fn test_low_scores_are_low() {
        let chunks = chunks_with_scores(&[0.3, 0.2]);
        assert_eq!(
            assess_confidence("The revenue grew 10% last quarter.", &chunks),
            Confidence::Low
        );
    }

    #[test]
    fn test_hedging_disqualifies_high() {
        let chunks = chunks_with_scores(&[0.9]);
        let label = assess_confidence("The revenue possibly grew last quarter.", &chunks);
        assert_ne!(label, Confidence::High);
        assert_eq!(label, Confidence::Medium);
    }

    #[test]
    fn test_hedging_match_is_case_insensitive() {
        let chunks = chunks_with_scores(&[0.95]);
        assert_eq!(
            assess_confidence("It is UNCLEAR from the filings.", &chunks),
            Confidence::Medium
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        // Exactly 0.8 must not qualify as high, exactly 0.6 not as medium.
        let chunks = chunks_with_scores(&[0.8]);
        assert_eq!(assess_confidence("Answer.", &chunks), Confidence::Medium);

        let chunks = chunks_with_scores(&[0.6]);
        assert_eq!(assess_confidence("Answer.", &chunks), Confidence::Low);
    }
}
