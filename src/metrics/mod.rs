//! Reference-based scoring of model responses
//!
//! Every function here takes text that has already been through
//! [`crate::normalize::normalize`], is pure, and returns a value in [0, 1].

mod bleu;
mod rouge;
mod token_f1;

pub use bleu::bleu;
pub use rouge::{RougeScores, rouge};
pub use token_f1::token_f1;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::AddAssign;

/// Scores for one response against one reference
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricVector {
    /// Token-set F1
    #[serde(rename = "f1_score")]
    pub f1: f64,
    /// Smoothed sentence BLEU
    #[serde(rename = "bleu_score")]
    pub bleu: f64,
    /// Unigram overlap F-measure after stemming
    pub rouge1: f64,
    /// Bigram overlap F-measure after stemming
    pub rouge2: f64,
    /// Longest-common-subsequence F-measure after stemming
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
    /// 1.0 when the reference occurs verbatim inside the response
    pub substring_match: f64,
}

impl MetricVector {
    pub const ZERO: MetricVector = MetricVector {
        f1: 0.0,
        bleu: 0.0,
        rouge1: 0.0,
        rouge2: 0.0,
        rouge_l: 0.0,
        substring_match: 0.0,
    };

    /// Metric names as they appear in snapshots
    pub const NAMES: [&'static str; 6] = [
        "f1_score",
        "bleu_score",
        "rouge1",
        "rouge2",
        "rougeL",
        "substring_match",
    ];

    /// Pairs of snapshot name and value, in [`Self::NAMES`] order
    pub fn named(&self) -> [(&'static str, f64); 6] {
        let values = [
            self.f1,
            self.bleu,
            self.rouge1,
            self.rouge2,
            self.rouge_l,
            self.substring_match,
        ];
        std::array::from_fn(|i| (Self::NAMES[i], values[i]))
    }

    /// Divide every metric by `count`; a zero count yields the zero vector
    pub fn averaged(&self, count: usize) -> MetricVector {
        if count == 0 {
            return MetricVector::ZERO;
        }
        let n = count as f64;
        MetricVector {
            f1: self.f1 / n,
            bleu: self.bleu / n,
            rouge1: self.rouge1 / n,
            rouge2: self.rouge2 / n,
            rouge_l: self.rouge_l / n,
            substring_match: self.substring_match / n,
        }
    }
}

impl AddAssign for MetricVector {
    fn add_assign(&mut self, other: MetricVector) {
        self.f1 += other.f1;
        self.bleu += other.bleu;
        self.rouge1 += other.rouge1;
        self.rouge2 += other.rouge2;
        self.rouge_l += other.rouge_l;
        self.substring_match += other.substring_match;
    }
}

/// Score a normalized candidate against a normalized reference
pub fn score(reference: &str, candidate: &str) -> MetricVector {
    let rouge = rouge(reference, candidate);
    MetricVector {
        f1: token_f1(reference, candidate),
        bleu: bleu(reference, candidate),
        rouge1: rouge.rouge1,
        rouge2: rouge.rouge2,
        rouge_l: rouge.rouge_l,
        substring_match: substring_match(reference, candidate),
    }
}

/// Cheap accuracy signal: does the response contain the reference verbatim?
pub fn substring_match(reference: &str, candidate: &str) -> f64 {
    if !reference.is_empty() && candidate.contains(reference) {
        1.0
    } else {
        0.0
    }
}

/// Harmonic mean of precision and recall, 0 when both are 0
pub(crate) fn f_measure(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Multiset of contiguous n-grams
pub(crate) fn ngram_counts<T: Eq + Hash>(tokens: &[T], n: usize) -> HashMap<&[T], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

/// Sum of min(candidate count, reference count) over candidate n-grams
pub(crate) fn clipped_overlap<T: Eq + Hash>(
    reference: &HashMap<&[T], usize>,
    candidate: &HashMap<&[T], usize>,
) -> usize {
    candidate
        .iter()
        .map(|(gram, &count)| count.min(reference.get(*gram).copied().unwrap_or(0)))
        .sum()
}
