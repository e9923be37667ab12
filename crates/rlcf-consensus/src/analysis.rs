//! Per-field consensus analysis.
//!
//! Where the disagreement score looks at whole judgments, this module looks at
//! individual payload fields. For every field that appears in any judgment it
//! builds an authority-weighted histogram of the values the field takes:
//!
//! | Distinct values | Field entropy | Reported as |
//! |-----------------|---------------|-------------|
//! | 1 | - | consensus area `"field: value"` |
//! | ≥ 2 | `> threshold` | [`ContentionPoint`] |
//! | ≥ 2 | `≤ threshold` | nothing |
//!
//! The field entropy is base 2 and unnormalized. It is a diagnostic only and
//! is kept apart from [`crate::disagreement_score`], whose threshold is
//! calibrated against the normalized form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canonicalize::value_label;
use crate::position::{sanitize_weight, Judgment};

/// Entropy threshold above which a field is reported as contended.
pub const DEFAULT_CONTENTION_THRESHOLD: f64 = 0.5;

/// A field on which evaluators split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionPoint {
    /// Field name.
    pub aspect: String,
    /// Value label → summed authority weight.
    pub positions: BTreeMap<String, f64>,
    /// Base-2 entropy of the field's weight distribution.
    pub disagreement_level: f64,
}

/// Outcome of [`ConsensusAnalyzer::analyze`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusAnalysis {
    /// `"field: value"` for every unanimous field, in field order.
    pub consensus_areas: Vec<String>,
    /// Contended fields, most contended first.
    pub contention_points: Vec<ContentionPoint>,
}

/// Field-level consensus and contention detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusAnalyzer {
    entropy_threshold: f64,
}

impl Default for ConsensusAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENTION_THRESHOLD)
    }
}

impl ConsensusAnalyzer {
    /// Creates an analyzer reporting fields whose entropy exceeds
    /// `entropy_threshold`.
    pub fn new(entropy_threshold: f64) -> Self {
        Self { entropy_threshold }
    }

    pub fn entropy_threshold(&self) -> f64 {
        self.entropy_threshold
    }

    /// Splits the fields of `judgments` into consensus areas and contention
    /// points.
    ///
    /// Contention points are sorted by `disagreement_level` descending, ties
    /// broken by aspect name.
    ///
    /// # Arguments
    ///
    /// * `judgments` - Weighted feedback payloads
    ///
    /// # Returns
    ///
    /// Unanimous fields as consensus areas and fields whose entropy exceeds
    /// the threshold as contention points. Fields in neither list split too
    /// mildly to report.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rlcf_consensus::{ConsensusAnalyzer, Judgment};
    /// use serde_json::json;
    ///
    /// let data = |v: serde_json::Value| v.as_object().cloned().unwrap();
    /// let analysis = ConsensusAnalyzer::default().analyze(&[
    ///     Judgment::new(1, "ada", 0.5, data(json!({ "label": "a", "source": "x" }))),
    ///     Judgment::new(2, "bob", 0.5, data(json!({ "label": "b", "source": "x" }))),
    /// ]);
    /// assert_eq!(analysis.consensus_areas, vec!["source: x"]);
    /// assert_eq!(analysis.contention_points[0].aspect, "label");
    /// ```
    pub fn analyze(&self, judgments: &[Judgment]) -> ConsensusAnalysis {
        let mut histograms: BTreeMap<&str, BTreeMap<String, f64>> = BTreeMap::new();
        for judgment in judgments {
            let weight = judgment.weight();
            for (field, value) in &judgment.data {
                *histograms
                    .entry(field.as_str())
                    .or_default()
                    .entry(value_label(value))
                    .or_insert(0.0) += weight;
            }
        }

        let mut analysis = ConsensusAnalysis::default();
        for (field, histogram) in histograms {
            if histogram.len() == 1 {
                if let Some(value) = histogram.keys().next() {
                    analysis.consensus_areas.push(format!("{}: {}", field, value));
                }
                continue;
            }

            let level = field_entropy(histogram.values().copied());
            debug!(field, level, values = histogram.len(), "field entropy");
            if level > self.entropy_threshold {
                analysis.contention_points.push(ContentionPoint {
                    aspect: field.to_string(),
                    positions: histogram,
                    disagreement_level: level,
                });
            }
        }

        analysis.contention_points.sort_by(|a, b| {
            b.disagreement_level
                .total_cmp(&a.disagreement_level)
                .then_with(|| a.aspect.cmp(&b.aspect))
        });
        analysis
    }
}

/// Base-2 Shannon entropy of a weight distribution.
///
/// Zero total weight yields 0.0. Negative and non-finite weights are read as
/// zero. Weights are summed in ascending order, so any permutation of the
/// same weights gives a bit-identical result.
pub fn field_entropy(weights: impl IntoIterator<Item = f64>) -> f64 {
    let mut weights: Vec<f64> = weights.into_iter().map(sanitize_weight).collect();
    weights.sort_by(f64::total_cmp);
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let mut entropy = 0.0;
    for weight in weights {
        if weight > 0.0 {
            let p = weight / total;
            entropy -= p * p.log2();
        }
    }
    entropy.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn judgment(user_id: u64, authority: f64, data: Value) -> Judgment {
        Judgment::new(user_id, "", authority, data.as_object().cloned().unwrap())
    }

    #[test]
    fn test_field_entropy() {
        assert_eq!(field_entropy([]), 0.0);
        assert_eq!(field_entropy([1.0]), 0.0);
        assert!((field_entropy([1.0, 1.0]) - 1.0).abs() < 1e-12);
        assert!((field_entropy([1.0, 1.0, 1.0, 1.0]) - 2.0).abs() < 1e-12);
        assert_eq!(field_entropy([0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_field_entropy_ignores_value_order() {
        let forward = field_entropy([0.1, 0.7, 0.3, 0.9]);
        let backward = field_entropy([0.9, 0.3, 0.7, 0.1]);
        assert_eq!(forward.to_bits(), backward.to_bits());
    }

    #[test]
    fn test_unanimous_fields_are_consensus_areas() {
        let analysis = ConsensusAnalyzer::default().analyze(&[
            judgment(1, 0.8, json!({ "answer": "yes", "confidence": 3 })),
            judgment(2, 0.6, json!({ "answer": "yes", "confidence": 3 })),
        ]);
        assert_eq!(analysis.consensus_areas, vec!["answer: yes", "confidence: 3"]);
        assert!(analysis.contention_points.is_empty());
    }

    #[test]
    fn test_split_field_is_contention_point() {
        let analysis = ConsensusAnalyzer::default().analyze(&[
            judgment(1, 0.8, json!({ "answer": "yes", "domain": "tax" })),
            judgment(2, 0.7, json!({ "answer": "no", "domain": "tax" })),
        ]);
        assert_eq!(analysis.consensus_areas, vec!["domain: tax"]);
        assert_eq!(analysis.contention_points.len(), 1);

        let point = &analysis.contention_points[0];
        assert_eq!(point.aspect, "answer");
        assert!((point.positions["yes"] - 0.8).abs() < 1e-12);
        assert!((point.positions["no"] - 0.7).abs() < 1e-12);
        assert!((point.disagreement_level - 0.996_791_631_98).abs() < 1e-9);
    }

    #[test]
    fn test_lopsided_field_below_threshold() {
        let analysis = ConsensusAnalyzer::new(0.5).analyze(&[
            judgment(1, 0.95, json!({ "answer": "yes" })),
            judgment(2, 0.05, json!({ "answer": "no" })),
        ]);
        assert!(analysis.consensus_areas.is_empty());
        assert!(analysis.contention_points.is_empty());
    }

    #[test]
    fn test_contention_order() {
        let analysis = ConsensusAnalyzer::new(0.1).analyze(&[
            judgment(1, 0.5, json!({ "a": 1, "b": "x", "c": "p" })),
            judgment(2, 0.5, json!({ "a": 2, "b": "y", "c": "q" })),
            judgment(3, 0.5, json!({ "a": 3, "b": "y", "c": "r" })),
        ]);
        let aspects: Vec<&str> = analysis
            .contention_points
            .iter()
            .map(|p| p.aspect.as_str())
            .collect();
        assert_eq!(aspects, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_non_string_values_use_canonical_labels() {
        let analysis = ConsensusAnalyzer::default().analyze(&[
            judgment(1, 0.5, json!({ "tags": ["x", "y"] })),
            judgment(2, 0.5, json!({ "tags": ["x", "y"] })),
        ]);
        assert_eq!(analysis.consensus_areas, vec![r#"tags: ["x","y"]"#]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            ConsensusAnalyzer::default().analyze(&[]),
            ConsensusAnalysis::default()
        );
    }
}
