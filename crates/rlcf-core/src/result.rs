//! Aggregation output types.
//!
//! [`AggregationResult`] is the stable wire contract: a tagged union
//! serialized with a `"kind"` field.
//!
//! ```text
//! { "kind": "error", "error_kind": "no_feedback", "message": "..." }
//! { "kind": "consensus", "consensus_answer": ..., "confidence_level": 1.0, ... }
//! { "kind": "uncertainty_preserving", "primary_answer": ..., "alternative_positions": [...], ... }
//! ```

use std::collections::BTreeMap;

use rlcf_consensus::{ContentionPoint, PatternLabel};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AggregationError, ErrorKind};

/// `consensus_strength` reported on the consensus branch.
pub const CONSENSUS_STRENGTH_HIGH: &str = "high";

/// Uncertainty sources reported on the uncertainty-preserving branch.
pub const UNCERTAINTY_SOURCES: [&str; 2] = ["expert_disagreement", "multiple_valid_interpretations"];

/// Outcome of a successful aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationOutput {
    /// δ at or below the threshold.
    Consensus(ConsensusResult),
    /// δ above the threshold.
    UncertaintyPreserving(UncertaintyPreservingResult),
}

impl AggregationOutput {
    pub fn is_consensus(&self) -> bool {
        matches!(self, AggregationOutput::Consensus(_))
    }

    /// Rounded disagreement score of either branch.
    pub fn disagreement_score(&self) -> f64 {
        match self {
            AggregationOutput::Consensus(r) => r.transparency_metrics.disagreement_score,
            AggregationOutput::UncertaintyPreserving(r) => {
                r.transparency_metrics.disagreement_score
            }
        }
    }

    pub fn confidence_level(&self) -> f64 {
        match self {
            AggregationOutput::Consensus(r) => r.confidence_level,
            AggregationOutput::UncertaintyPreserving(r) => r.confidence_level,
        }
    }
}

/// Full aggregation outcome, errors included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationResult {
    Error(ErrorResult),
    Consensus(ConsensusResult),
    UncertaintyPreserving(UncertaintyPreservingResult),
}

impl AggregationResult {
    pub fn is_error(&self) -> bool {
        matches!(self, AggregationResult::Error(_))
    }
}

impl From<AggregationOutput> for AggregationResult {
    fn from(output: AggregationOutput) -> Self {
        match output {
            AggregationOutput::Consensus(r) => AggregationResult::Consensus(r),
            AggregationOutput::UncertaintyPreserving(r) => AggregationResult::UncertaintyPreserving(r),
        }
    }
}

impl From<AggregationError> for AggregationResult {
    fn from(err: AggregationError) -> Self {
        AggregationResult::Error(ErrorResult {
            error_kind: err.kind(),
            message: err.to_string(),
        })
    }
}

impl From<Result<AggregationOutput, AggregationError>> for AggregationResult {
    fn from(result: Result<AggregationOutput, AggregationError>) -> Self {
        match result {
            Ok(output) => output.into(),
            Err(err) => err.into(),
        }
    }
}

/// Serialized form of an [`AggregationError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error_kind: ErrorKind,
    pub message: String,
}

/// Single-answer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub consensus_answer: Value,
    /// `round(1 - δ, 2)`.
    pub confidence_level: f64,
    pub transparency_metrics: ConsensusMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    pub evaluator_count: usize,
    /// Always [`CONSENSUS_STRENGTH_HIGH`].
    pub consensus_strength: String,
    /// `round(δ, 3)`.
    pub disagreement_score: f64,
}

/// Output that keeps the full spread of expert positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyPreservingResult {
    /// The handler's consensus answer.
    pub primary_answer: Value,
    /// `round(1 - δ, 2)`.
    pub confidence_level: f64,
    /// Every position except the heaviest, heaviest first.
    pub alternative_positions: Vec<AlternativePosition>,
    pub expert_disagreement: ExpertDisagreement,
    pub epistemic_metadata: EpistemicMetadata,
    pub transparency_metrics: UncertaintyMetrics,
}

/// A minority position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativePosition {
    /// Canonical position key.
    pub position: String,
    /// Share of total weight, e.g. `"46.7%"`.
    pub support: String,
    /// Leading supporter display names.
    pub supporters: Vec<String>,
    /// Rationale of the first supporter, or empty.
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpertDisagreement {
    pub consensus_areas: Vec<String>,
    pub contention_points: Vec<ContentionPoint>,
    pub reasoning_patterns: BTreeMap<PatternLabel, Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpistemicMetadata {
    pub uncertainty_sources: Vec<String>,
    pub suggested_research: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyMetrics {
    pub evaluator_count: usize,
    pub total_authority_weight: f64,
    /// `round(δ, 3)`.
    pub disagreement_score: f64,
}
