use std::collections::HashSet;

use super::f_measure;

/// Token-level F1 between two normalized strings.
///
/// Tokens are compared as sets, so repeated words count once. Two empty
/// inputs agree perfectly; exactly one empty input scores zero.
pub fn token_f1(reference: &str, candidate: &str) -> f64 {
    let reference: HashSet<&str> = reference.split_whitespace().collect();
    let candidate: HashSet<&str> = candidate.split_whitespace().collect();

    match (reference.is_empty(), candidate.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let overlap = reference.intersection(&candidate).count() as f64;
    let precision = overlap / candidate.len() as f64;
    let recall = overlap / reference.len() as f64;

    f_measure(precision, recall)
}
