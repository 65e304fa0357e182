use super::{clipped_overlap, ngram_counts};

/// Numerator used in place of a zero n-gram match count
const SMOOTHING_EPSILON: f64 = 0.1;

/// Candidates shorter than this are scored on unigrams only
const SHORT_CANDIDATE_TOKENS: usize = 4;

/// Sentence-level BLEU for a single reference.
///
/// Uses clipped n-gram precision, uniform weights over 1..=4 grams (unigrams
/// only for short candidates), epsilon smoothing of zero higher-order counts
/// and the standard brevity penalty. No unigram overlap at all scores 0.
pub fn bleu(reference: &str, candidate: &str) -> f64 {
    let reference: Vec<&str> = reference.split_whitespace().collect();
    let candidate: Vec<&str> = candidate.split_whitespace().collect();

    if reference.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let max_order = if candidate.len() < SHORT_CANDIDATE_TOKENS {
        1
    } else {
        4
    };
    let weight = 1.0 / max_order as f64;

    let mut log_precision = 0.0;
    for n in 1..=max_order {
        let reference_grams = ngram_counts(&reference, n);
        let candidate_grams = ngram_counts(&candidate, n);
        let matches = clipped_overlap(&reference_grams, &candidate_grams);
        let total = candidate.len().saturating_sub(n - 1).max(1) as f64;

        if matches == 0 && n == 1 {
            return 0.0;
        }

        let precision = if matches == 0 {
            SMOOTHING_EPSILON / total
        } else {
            matches as f64 / total
        };
        log_precision += weight * precision.ln();
    }

    let score = brevity_penalty(reference.len(), candidate.len()) * log_precision.exp();
    score.clamp(0.0, 1.0)
}

fn brevity_penalty(reference_len: usize, candidate_len: usize) -> f64 {
    if candidate_len > reference_len {
        1.0
    } else {
        (1.0 - reference_len as f64 / candidate_len as f64).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bleu_identical_sentence() {
        let sentence = "the quick brown fox jumps over the lazy dog";
        assert!((bleu(sentence, sentence) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bleu_identical_short_answer() {
        assert!((bleu("paris", "paris") - 1.0).abs() < 1e-9);
        assert!((bleu("william shakespeare", "william shakespeare") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bleu_empty() {
        assert_eq!(bleu("the cat sat", ""), 0.0);
        assert_eq!(bleu("", "the cat sat"), 0.0);
        assert_eq!(bleu("", ""), 0.0);
    }

    #[test]
    fn test_bleu_no_unigram_overlap() {
        assert_eq!(bleu("paris", "london is lovely today"), 0.0);
    }

    #[test]
    fn test_bleu_partial_overlap() {
        // p1 = 5/6, p2 = 3/5, p3 = 2/4, p4 = 1/3, equal lengths
        let score = bleu("the cat sat on the mat", "the cat sat on a mat");
        let expected = (5.0 / 6.0 * 3.0 / 5.0 * 2.0 / 4.0 * 1.0 / 3.0_f64).powf(0.25);
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_bleu_smoothing_keeps_score_positive() {
        // every unigram matches but no bigram does
        let score = bleu("a b c d", "d c b a");
        assert!(score > 0.0);
        assert!(score < 0.2);
    }

    #[test]
    fn test_bleu_brevity_penalty() {
        let score = bleu("the cat sat on the mat", "the cat");
        assert!((score - (-2.0_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_brevity_penalty_longer_candidate() {
        assert_eq!(brevity_penalty(3, 5), 1.0);
        assert_eq!(brevity_penalty(5, 5), 1.0);
    }
}
