//! # Disagreement Scorer
//!
//! Normalized Shannon entropy over the authority-weighted position
//! distribution. This is the gating signal that decides between the
//! consensus and uncertainty-preserving outputs.
//!
//! ## Formula
//!
//! ```text
//! ρ(p) = w(p) / Σ w
//! δ    = -Σ ρ(p) · log_N ρ(p)        N = number of positions
//! ```
//!
//! Taking the logarithm in base `N` maps the entropy of a uniform split over
//! any number of positions to 1.0, so one threshold works for tasks with two
//! positions and tasks with ten.
//!
//! | Input | δ |
//! |-------|---|
//! | no positions | 0.0 |
//! | one position | 0.0 |
//! | all weight zero | 0.0 |
//! | `{a: w, b: 0}` | 0.0 |
//! | uniform over N | 1.0 |
//!
//! By convention `0 · log 0 = 0`. Negative and non-finite weights are read
//! as zero.
//!
//! ## References
//!
//! - **Shannon, C.E. (1948)** - "A Mathematical Theory of Communication"

use std::collections::BTreeMap;

use crate::position::sanitize_weight;

/// Disagreement score δ ∈ [0, 1] for a position-weight mapping.
///
/// An absent mapping is represented by an empty one.
///
/// # Arguments
///
/// * `position_weights` - Position key → summed authority weight
///
/// # Returns
///
/// - `0.0` for fewer than two positions or zero total weight
/// - the entropy normalized by `ln N` otherwise
///
/// # Example
///
/// ```rust
/// use rlcf_consensus::disagreement_score;
/// use std::collections::BTreeMap;
///
/// let weights = BTreeMap::from([("yes".to_string(), 1.0), ("no".to_string(), 1.0)]);
/// assert!((disagreement_score(&weights) - 1.0).abs() < 1e-12);
/// ```
pub fn disagreement_score(position_weights: &BTreeMap<String, f64>) -> f64 {
    normalized_entropy(position_weights.values().copied())
}

/// Entropy of `weights` in base `count(weights)`, clamped to [0, 1].
pub fn normalized_entropy(weights: impl IntoIterator<Item = f64>) -> f64 {
    let weights: Vec<f64> = weights.into_iter().map(sanitize_weight).collect();
    if weights.len() < 2 {
        return 0.0;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let base = (weights.len() as f64).ln();
    let mut entropy = 0.0;
    for weight in weights {
        if weight > 0.0 {
            let p = weight / total;
            entropy -= p * p.ln() / base;
        }
    }
    entropy.clamp(0.0, 1.0)
}
