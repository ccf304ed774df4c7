//! Normalization of log-domain scores into probability vectors.

use super::stable::log_sum_exp;
use serde::{Deserialize, Serialize};

/// Default tolerance for simplex membership checks.
pub const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// A probability vector together with the log normalizer it was divided by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLogProbs {
    /// Probabilities summing to 1.
    pub probabilities: Vec<f64>,
    /// log(sum(exp(log_scores))), i.e. the log marginal of the scores.
    pub log_normalizer: f64,
}

/// Convert unnormalized log scores into probabilities.
///
/// Returns None for empty input, NaN scores, or when every score is -inf
/// (no class explains the data).
pub fn normalize_log_probs(log_scores: &[f64]) -> Option<NormalizedLogProbs> {
    let log_normalizer = log_sum_exp(log_scores);
    if !log_normalizer.is_finite() {
        return None;
    }
    let probabilities = log_scores
        .iter()
        .map(|&s| (s - log_normalizer).exp())
        .collect();
    Some(NormalizedLogProbs {
        probabilities,
        log_normalizer,
    })
}

/// Scale non-negative weights so they sum to 1.
///
/// Returns None if any weight is negative or non-finite, or if the total is zero.
pub fn normalize_weights(weights: &[f64]) -> Option<Vec<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    Some(weights.iter().map(|w| w / total).collect())
}

/// Whether `values` is a point of the probability simplex within `tol`.
pub fn is_probability_vector(values: &[f64], tol: f64) -> bool {
    if values.is_empty() {
        return false;
    }
    if values
        .iter()
        .any(|v| !v.is_finite() || *v < -tol || *v > 1.0 + tol)
    {
        return false;
    }
    let sum: f64 = values.iter().sum();
    (sum - 1.0).abs() <= tol
}

/// Index of the largest entry; ties resolve to the lowest index.
///
/// Returns None for empty input or if any entry is NaN.
pub fn argmax(values: &[f64]) -> Option<usize> {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return None;
    }
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    Some(best)
}
