//! Reasoning-pattern classifier.
//!
//! Sorts free-text rationales into argument styles with a small keyword
//! taxonomy. Patterns are tried in order and the first whose trigger occurs
//! in the lower-cased text wins:
//!
//! | Order | Triggers | Label |
//! |-------|----------|-------|
//! | 1 | `precedent`, `case law` | `precedent-based` |
//! | 2 | `principle`, `fundamental` | `principle-based` |
//! | 3 | `practical`, `consequence` | `pragmatic` |
//! | - | anything else | `other` |
//!
//! Judgments without a textual `reasoning` field are left out entirely.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::Judgment;

/// Argument style of a rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternLabel {
    PrecedentBased,
    PrincipleBased,
    Pragmatic,
    Other,
}

impl PatternLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternLabel::PrecedentBased => "precedent-based",
            PatternLabel::PrincipleBased => "principle-based",
            PatternLabel::Pragmatic => "pragmatic",
            PatternLabel::Other => "other",
        }
    }
}

impl fmt::Display for PatternLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A label with the phrases that select it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPattern {
    pub label: PatternLabel,
    /// Lower-case phrases; any one matching selects the label.
    pub triggers: Vec<String>,
}

impl ReasoningPattern {
    pub fn new(label: PatternLabel, triggers: &[&str]) -> Self {
        Self {
            label,
            triggers: triggers.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    fn matches(&self, text_lower: &str) -> bool {
        self.triggers.iter().any(|t| text_lower.contains(t.as_str()))
    }
}

/// Keyword classifier over judgment rationales.
#[derive(Debug, Clone)]
pub struct ReasoningClassifier {
    patterns: Vec<ReasoningPattern>,
}

impl Default for ReasoningClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningClassifier {
    /// Classifier with the standard legal-argument taxonomy.
    pub fn new() -> Self {
        Self {
            patterns: Self::default_patterns(),
        }
    }

    /// Classifier with custom patterns, tried in the given order.
    pub fn with_patterns(patterns: Vec<ReasoningPattern>) -> Self {
        Self { patterns }
    }

    fn default_patterns() -> Vec<ReasoningPattern> {
        vec![
            ReasoningPattern::new(PatternLabel::PrecedentBased, &["precedent", "case law"]),
            ReasoningPattern::new(PatternLabel::PrincipleBased, &["principle", "fundamental"]),
            ReasoningPattern::new(PatternLabel::Pragmatic, &["practical", "consequence"]),
        ]
    }

    /// Label of a single rationale.
    pub fn classify_text(&self, text: &str) -> PatternLabel {
        let lower = text.to_lowercase();
        self.patterns
            .iter()
            .find(|p| p.matches(&lower))
            .map(|p| p.label)
            .unwrap_or(PatternLabel::Other)
    }

    /// Groups evaluator ids by the style of their rationale.
    ///
    /// Only non-empty buckets appear. Ids keep input order.
    pub fn classify(&self, judgments: &[Judgment]) -> BTreeMap<PatternLabel, Vec<u64>> {
        let mut buckets: BTreeMap<PatternLabel, Vec<u64>> = BTreeMap::new();
        for judgment in judgments {
            if let Some(text) = judgment.reasoning() {
                buckets
                    .entry(self.classify_text(text))
                    .or_default()
                    .push(judgment.user_id);
            }
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn judgment(user_id: u64, data: Value) -> Judgment {
        Judgment::new(user_id, "", 0.5, data.as_object().cloned().unwrap())
    }

    #[test]
    fn test_classify_text() {
        let classifier = ReasoningClassifier::new();
        assert_eq!(classifier.classify_text("Based on precedent X"), PatternLabel::PrecedentBased);
        assert_eq!(classifier.classify_text("Settled CASE LAW"), PatternLabel::PrecedentBased);
        assert_eq!(
            classifier.classify_text("A fundamental right is at stake"),
            PatternLabel::PrincipleBased
        );
        assert_eq!(
            classifier.classify_text("The consequences would be severe"),
            PatternLabel::Pragmatic
        );
        assert_eq!(classifier.classify_text("Gut feeling"), PatternLabel::Other);
        assert_eq!(classifier.classify_text(""), PatternLabel::Other);
    }

    #[test]
    fn test_first_match_wins() {
        let classifier = ReasoningClassifier::new();
        assert_eq!(
            classifier.classify_text("A practical reading of the precedent"),
            PatternLabel::PrecedentBased
        );
        assert_eq!(
            classifier.classify_text("Practical, but grounded in principle"),
            PatternLabel::PrincipleBased
        );
    }

    #[test]
    fn test_missing_reasoning_is_excluded() {
        let buckets = ReasoningClassifier::new().classify(&[
            judgment(1, json!({ "answer": "yes", "reasoning": "Based on precedent X" })),
            judgment(2, json!({ "answer": "no" })),
            judgment(3, json!({ "answer": "no", "reasoning": 7 })),
        ]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&PatternLabel::PrecedentBased], vec![1]);
        assert!(buckets.values().flatten().all(|id| *id == 1));
    }

    #[test]
    fn test_ids_keep_input_order() {
        let buckets = ReasoningClassifier::new().classify(&[
            judgment(9, json!({ "reasoning": "no idea" })),
            judgment(2, json!({ "reasoning": "just because" })),
            judgment(5, json!({ "reasoning": "practical outcome" })),
        ]);
        assert_eq!(buckets[&PatternLabel::Other], vec![9, 2]);
        assert_eq!(buckets[&PatternLabel::Pragmatic], vec![5]);
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(
            serde_json::to_value(PatternLabel::PrecedentBased).unwrap(),
            json!("precedent-based")
        );
        assert_eq!(PatternLabel::Pragmatic.to_string(), "pragmatic");
    }

    #[test]
    fn test_custom_patterns() {
        let classifier = ReasoningClassifier::with_patterns(vec![ReasoningPattern::new(
            PatternLabel::Pragmatic,
            &["Cost"],
        )]);
        assert_eq!(classifier.classify_text("cost of compliance"), PatternLabel::Pragmatic);
        assert_eq!(classifier.classify_text("precedent"), PatternLabel::Other);
    }
}
