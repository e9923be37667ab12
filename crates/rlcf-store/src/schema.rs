//! Feedback schema registry.
//!
//! Maps every [`TaskType`] to the fields its feedback must and may carry.
//! Validation happens once, when feedback enters the store; the aggregation
//! core downstream only ever sees generic key/value payloads.

use crate::error::{Result, StoreError};
use crate::models::{Payload, TaskType};

/// Declared feedback fields of one task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackSchema {
    /// Task type this schema belongs to.
    pub task_type: TaskType,
    /// Fields every feedback entry must contain.
    pub required: &'static [&'static str],
    /// Fields a feedback entry may contain.
    pub optional: &'static [&'static str],
    /// Fields that carry the evaluator's verdict, used for majority voting.
    pub answer_fields: &'static [&'static str],
}

impl FeedbackSchema {
    /// Returns the schema for a task type.
    pub fn for_task_type(task_type: TaskType) -> Self {
        let (required, optional, answer_fields): (
            &'static [&'static str],
            &'static [&'static str],
            &'static [&'static str],
        ) = match task_type {
            TaskType::Qa => (
                &["validated_answer", "position"],
                &["reasoning", "source_accuracy"],
                &["validated_answer", "position"],
            ),
            TaskType::StatutoryRuleQa => (
                &["validated_answer", "position"],
                &["reasoning", "legal_accuracy", "citation_quality"],
                &["validated_answer", "position"],
            ),
            TaskType::Classification => (
                &["validated_labels"],
                &["reasoning", "confidence"],
                &["validated_labels"],
            ),
            TaskType::Summarization => (
                &["revised_summary", "rating"],
                &["reasoning"],
                &["rating"],
            ),
            TaskType::Prediction => (&["chosen_outcome"], &["reasoning"], &["chosen_outcome"]),
            TaskType::Nli => (&["chosen_label"], &["reasoning"], &["chosen_label"]),
            TaskType::Ner => (&["validated_tags"], &["reasoning"], &["validated_tags"]),
            TaskType::Drafting => (
                &["revised_target", "rating"],
                &["reasoning"],
                &["rating"],
            ),
            TaskType::RiskSpotting => (
                &["validated_risk_labels", "validated_severity"],
                &["reasoning"],
                &["validated_risk_labels", "validated_severity"],
            ),
            TaskType::DoctrineApplication => {
                (&["chosen_label"], &["reasoning"], &["chosen_label"])
            }
        };

        Self {
            task_type,
            required,
            optional,
            answer_fields,
        }
    }

    /// Returns true if `field` is declared by this schema.
    pub fn declares(&self, field: &str) -> bool {
        self.required.contains(&field) || self.optional.contains(&field)
    }

    /// Checks a feedback payload against this schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaViolation`] naming the first missing
    /// required field, or the first undeclared field.
    pub fn validate(&self, data: &Payload) -> Result<()> {
        if let Some(missing) = self.required.iter().find(|f| !data.contains_key(**f)) {
            return Err(self.violation(format!("missing required field '{}'", missing)));
        }
        if let Some(unknown) = data.keys().find(|k| !self.declares(k)) {
            return Err(self.violation(format!("unknown field '{}'", unknown)));
        }
        Ok(())
    }

    fn violation(&self, reason: String) -> StoreError {
        StoreError::SchemaViolation {
            task_type: self.task_type.to_string(),
            reason,
        }
    }
}

/// Validates `data` against the schema registered for `task_type`.
pub fn validate_feedback(task_type: TaskType, data: &Payload) -> Result<()> {
    FeedbackSchema::for_task_type(task_type).validate(data)
}
