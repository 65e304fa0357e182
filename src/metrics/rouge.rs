use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::{clipped_overlap, f_measure, ngram_counts};

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid pattern"));
static STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// Tokens this short are compared without stemming
const MIN_STEM_LEN: usize = 4;

/// ROUGE F-measures for one reference/candidate pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RougeScores {
    pub rouge1: f64,
    pub rouge2: f64,
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
}

/// ROUGE-1, ROUGE-2 and ROUGE-L F-measures over stemmed tokens
///
/// Texts without any letter or digit (e.g. "...") have no tokens; they
/// score 1.0 only against the identical non-empty text.
pub fn rouge(reference: &str, candidate: &str) -> RougeScores {
    let reference_tokens = tokenize(reference);
    let candidate_tokens = tokenize(candidate);

    if reference_tokens.is_empty() && candidate_tokens.is_empty() {
        let score = if !reference.trim().is_empty() && reference == candidate {
            1.0
        } else {
            0.0
        };
        return RougeScores {
            rouge1: score,
            rouge2: score,
            rouge_l: score,
        };
    }

    let (reference, candidate) = (reference_tokens, candidate_tokens);
    RougeScores {
        rouge1: rouge_n(&reference, &candidate, 1),
        rouge2: rouge_n(&reference, &candidate, 2),
        rouge_l: rouge_l(&reference, &candidate),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(|token| {
            if token.chars().count() >= MIN_STEM_LEN {
                STEMMER.stem(token).into_owned()
            } else {
                token.to_string()
            }
        })
        .filter(|token| !token.is_empty())
        .collect()
}

fn rouge_n(reference: &[String], candidate: &[String], n: usize) -> f64 {
    let reference_grams = ngram_counts(reference, n);
    let candidate_grams = ngram_counts(candidate, n);
    let reference_total: usize = reference_grams.values().sum();
    let candidate_total: usize = candidate_grams.values().sum();

    // Both texts are shorter than n: only an exact match counts.
    if reference_total == 0 && candidate_total == 0 {
        return exact_or_zero(reference, candidate);
    }

    let overlap = clipped_overlap(&reference_grams, &candidate_grams) as f64;
    let precision = overlap / candidate_total.max(1) as f64;
    let recall = overlap / reference_total.max(1) as f64;
    f_measure(precision, recall)
}

fn rouge_l(reference: &[String], candidate: &[String]) -> f64 {
    if reference.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let lcs = lcs_len(reference, candidate) as f64;
    f_measure(lcs / candidate.len() as f64, lcs / reference.len() as f64)
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            current[j + 1] = if x == y {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

fn exact_or_zero(reference: &[String], candidate: &[String]) -> f64 {
    if !reference.is_empty() && reference == candidate {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_rouge_identical() {
        let scores = rouge("the cat sat on the mat", "the cat sat on the mat");
        assert_close(scores.rouge1, 1.0);
        assert_close(scores.rouge2, 1.0);
        assert_close(scores.rouge_l, 1.0);
    }

    #[test]
    fn test_rouge_identical_single_token() {
        let scores = rouge("paris", "paris");
        assert_close(scores.rouge1, 1.0);
        assert_close(scores.rouge2, 1.0);
        assert_close(scores.rouge_l, 1.0);
    }

    #[test]
    fn test_rouge_single_tokens_differ() {
        let scores = rouge("paris", "london");
        assert_eq!(scores, RougeScores::default());
    }

    #[test]
    fn test_rouge_stemming() {
        let scores = rouge("the cats are running", "the cat is run");
        assert_close(scores.rouge1, 0.75);
        assert_close(scores.rouge2, 1.0 / 3.0);
        assert_close(scores.rouge_l, 0.75);
    }

    #[test]
    fn test_rouge_empty() {
        assert_eq!(rouge("", ""), RougeScores::default());
        assert_eq!(rouge("   ", "   "), RougeScores::default());
        assert_eq!(rouge("the cat", ""), RougeScores::default());
        assert_eq!(rouge("...", "the cat"), RougeScores::default());
    }

    #[test]
    fn test_rouge_identical_without_tokens() {
        let scores = rouge("...", "...");
        assert_close(scores.rouge1, 1.0);
        assert_close(scores.rouge2, 1.0);
        assert_close(scores.rouge_l, 1.0);
        assert_eq!(rouge("...", ",,,"), RougeScores::default());
    }

    #[test]
    fn test_rouge_identical_non_ascii() {
        for text in ["東京", "москва", "café crème", "北京 上海"] {
            let scores = rouge(text, text);
            assert_close(scores.rouge1, 1.0);
            assert_close(scores.rouge2, 1.0);
            assert_close(scores.rouge_l, 1.0);
        }
        assert_eq!(rouge("東京", "大阪"), RougeScores::default());
    }

    #[test]
    fn test_rouge_l_respects_order() {
        // LCS of (a b c d) and (d c b a) is 1
        let scores = rouge("alpha beta gamma delta", "delta gamma beta alpha");
        assert_close(scores.rouge1, 1.0);
        assert_close(scores.rouge2, 0.0);
        assert_close(scores.rouge_l, 0.25);
    }

    #[test]
    fn test_tokenize_drops_punctuation() {
        assert_eq!(tokenize("it's 3.14, ok"), vec!["it", "s", "3", "14", "ok"]);
    }

    #[test]
    fn test_tokenize_keeps_non_ascii_letters() {
        let tokens = tokenize("東京, москва!");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], "東京");
    }

    #[test]
    fn test_lcs_len() {
        let a: Vec<String> = ["a", "b", "c", "b", "d"].iter().map(|s| s.to_string()).collect();
        let b: Vec<String> = ["b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(lcs_len(&a, &b), 3);
    }
}
