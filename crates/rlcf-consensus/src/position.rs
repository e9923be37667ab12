//! Position extraction.
//!
//! Groups judgments by the canonical form of their payload. Every judgment
//! lands in exactly one position, and a position exists only if at least one
//! judgment supports it.
//!
//! The key is deliberately literal: free-text fields are part of it, so two
//! rationales that differ by a single character form two positions. Callers
//! wanting fuzzy grouping must normalize payloads before extraction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonicalize::canonical_key;

/// Canonical payload serialization identifying a position.
pub type PositionKey = String;

/// Name of the payload field holding the free-text rationale.
pub const REASONING_FIELD: &str = "reasoning";

/// One evaluator's weighted judgment, the unit every analysis consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Evaluator id.
    pub user_id: u64,
    /// Evaluator display name.
    pub display_name: String,
    /// Authority weight; negative or non-finite weights count as 0.
    pub authority: f64,
    /// Schema-less judgment payload.
    pub data: Map<String, Value>,
}

impl Judgment {
    /// Creates a judgment.
    pub fn new(
        user_id: u64,
        display_name: impl Into<String>,
        authority: f64,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            authority,
            data,
        }
    }

    /// Authority usable as a weight.
    pub fn weight(&self) -> f64 {
        sanitize_weight(self.authority)
    }

    /// The `reasoning` field, if present and textual.
    pub fn reasoning(&self) -> Option<&str> {
        self.data.get(REASONING_FIELD).and_then(Value::as_str)
    }
}

/// An evaluator backing a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supporter {
    pub user_id: u64,
    pub display_name: String,
    pub authority_weight: f64,
    /// The supporter's `reasoning` text, or empty.
    pub rationale_text: String,
}

/// A distinct judgment with everyone who made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub key: PositionKey,
    /// Non-empty, in input order.
    pub supporters: Vec<Supporter>,
    /// Sum of supporter weights.
    pub weight: f64,
}

/// The partition of a judgment set into positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Positions {
    by_key: BTreeMap<PositionKey, Vec<Supporter>>,
}

impl Positions {
    /// Number of distinct positions.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Supporters of one position.
    pub fn supporters(&self, key: &str) -> Option<&[Supporter]> {
        self.by_key.get(key).map(Vec::as_slice)
    }

    /// Iterates positions in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PositionKey, &Vec<Supporter>)> {
        self.by_key.iter()
    }

    /// Total authority weight per position.
    pub fn weights(&self) -> BTreeMap<PositionKey, f64> {
        self.by_key
            .iter()
            .map(|(key, supporters)| (key.clone(), supporter_weight(supporters)))
            .collect()
    }

    /// Sum of all supporter weights.
    pub fn total_weight(&self) -> f64 {
        self.by_key.values().map(|s| supporter_weight(s)).sum()
    }

    /// Positions ordered by weight descending, ties broken by key ascending.
    pub fn ranked(&self) -> Vec<Position> {
        let mut ranked: Vec<Position> = self
            .by_key
            .iter()
            .map(|(key, supporters)| Position {
                key: key.clone(),
                weight: supporter_weight(supporters),
                supporters: supporters.clone(),
            })
            .collect();
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.key.cmp(&b.key)));
        ranked
    }

    /// Key of the first position `user_id` supports.
    pub fn position_of(&self, user_id: u64) -> Option<&PositionKey> {
        self.by_key
            .iter()
            .find(|(_, supporters)| supporters.iter().any(|s| s.user_id == user_id))
            .map(|(key, _)| key)
    }
}

/// Groups judgments into positions keyed by canonical payload.
///
/// Payloads that differ only in key order or number spelling share a
/// position. An empty input yields an empty partition.
///
/// # Arguments
///
/// * `judgments` - Weighted feedback payloads, in any order
///
/// # Returns
///
/// A partition of `judgments` in which every judgment supports exactly one
/// position.
///
/// # Example
///
/// ```rust
/// use rlcf_consensus::{extract_positions, Judgment};
/// use serde_json::json;
///
/// let data = |v: serde_json::Value| v.as_object().cloned().unwrap();
/// let positions = extract_positions(&[
///     Judgment::new(1, "ada", 0.8, data(json!({ "answer": "yes", "n": 1 }))),
///     Judgment::new(2, "bob", 0.4, data(json!({ "n": 1.0, "answer": "yes" }))),
/// ]);
/// assert_eq!(positions.len(), 1);
/// assert!((positions.total_weight() - 1.2).abs() < 1e-12);
/// ```
pub fn extract_positions(judgments: &[Judgment]) -> Positions {
    let mut by_key: BTreeMap<PositionKey, Vec<Supporter>> = BTreeMap::new();
    for judgment in judgments {
        by_key
            .entry(canonical_key(&judgment.data))
            .or_default()
            .push(Supporter {
                user_id: judgment.user_id,
                display_name: judgment.display_name.clone(),
                authority_weight: judgment.weight(),
                rationale_text: judgment.reasoning().unwrap_or_default().to_string(),
            });
    }
    Positions { by_key }
}

/// Maps negative and non-finite weights to 0.
pub fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

fn supporter_weight(supporters: &[Supporter]) -> f64 {
    supporters.iter().map(|s| s.authority_weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn judgment(user_id: u64, authority: f64, data: Value) -> Judgment {
        Judgment::new(
            user_id,
            format!("user{}", user_id),
            authority,
            data.as_object().cloned().unwrap(),
        )
    }

    #[test]
    fn test_empty_input() {
        let positions = extract_positions(&[]);
        assert!(positions.is_empty());
        assert!(positions.weights().is_empty());
        assert_eq!(positions.total_weight(), 0.0);
    }

    #[test]
    fn test_identical_payloads_collapse() {
        let positions = extract_positions(&[
            judgment(1, 0.8, json!({ "answer": "yes", "position": "correct" })),
            judgment(2, 0.7, json!({ "position": "correct", "answer": "yes" })),
        ]);
        assert_eq!(positions.len(), 1);
        let (_, supporters) = positions.iter().next().unwrap();
        assert_eq!(supporters.len(), 2);
        assert!((positions.total_weight() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_free_text_splits_positions() {
        let positions = extract_positions(&[
            judgment(1, 0.5, json!({ "answer": "yes", "reasoning": "case law" })),
            judgment(2, 0.5, json!({ "answer": "yes", "reasoning": "case law." })),
        ]);
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_partition_covers_every_judgment() {
        let judgments = vec![
            judgment(1, 0.2, json!({ "answer": "yes" })),
            judgment(2, 0.3, json!({ "answer": "no" })),
            judgment(3, 0.4, json!({ "answer": "yes" })),
            judgment(4, 0.1, json!({ "answer": "maybe" })),
        ];
        let positions = extract_positions(&judgments);
        let supporter_count: usize = positions.iter().map(|(_, s)| s.len()).sum();
        assert_eq!(supporter_count, judgments.len());
        assert!(positions.iter().all(|(_, s)| !s.is_empty()));
    }

    #[test]
    fn test_supporter_fields() {
        let positions = extract_positions(&[
            judgment(1, 0.8, json!({ "answer": "yes", "reasoning": "precedent" })),
            judgment(2, 0.6, json!({ "answer": "no" })),
        ]);
        let ranked = positions.ranked();
        assert_eq!(ranked[0].supporters[0].rationale_text, "precedent");
        assert_eq!(ranked[0].supporters[0].display_name, "user1");
        assert_eq!(ranked[1].supporters[0].rationale_text, "");
    }

    #[test]
    fn test_ranked_order_and_ties() {
        let positions = extract_positions(&[
            judgment(1, 0.5, json!({ "answer": "b" })),
            judgment(2, 0.5, json!({ "answer": "a" })),
            judgment(3, 0.9, json!({ "answer": "c" })),
        ]);
        let keys: Vec<String> = positions.ranked().into_iter().map(|p| p.key).collect();
        assert_eq!(
            keys,
            vec![
                r#"{"answer":"c"}"#.to_string(),
                r#"{"answer":"a"}"#.to_string(),
                r#"{"answer":"b"}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_bad_weights_count_as_zero() {
        let positions = extract_positions(&[
            judgment(1, -0.5, json!({ "answer": "yes" })),
            judgment(2, f64::NAN, json!({ "answer": "no" })),
        ]);
        assert_eq!(positions.total_weight(), 0.0);
    }

    #[test]
    fn test_position_of() {
        let positions = extract_positions(&[
            judgment(1, 0.5, json!({ "answer": "yes" })),
            judgment(2, 0.5, json!({ "answer": "no" })),
        ]);
        assert_eq!(positions.position_of(2).unwrap(), r#"{"answer":"no"}"#);
        assert!(positions.position_of(3).is_none());
    }
}
