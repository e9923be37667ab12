//! The aggregation orchestrator.
//!
//! [`Aggregator::aggregate`] runs a fixed pipeline over one task:
//!
//! ```text
//!  task? ──no──► NotFound
//!    │
//!  feedback? ──empty──► NoFeedback
//!    │
//!  resolve weights ──► handler ──Err──► HandlerError
//!    │
//!  positions ──► δ = disagreement_score
//!    │
//!    ├── δ ≤ τ ──► ConsensusResult
//!    └── δ > τ ──► UncertaintyPreservingResult
//!                   (alternatives, field analysis, reasoning patterns)
//! ```
//!
//! The aggregator reads only. Marking a task aggregated, or feeding peer
//! agreement back into authority, are separate calls.

use std::sync::Arc;

use rlcf_consensus::{
    disagreement_score, extract_positions, ConsensusAnalyzer, Judgment, Position,
    ReasoningClassifier,
};
use rlcf_store::{Feedback, FeedbackStore, StoreError, UserStore};
use tracing::{debug, info, instrument, warn};

use crate::config::RlcfConfig;
use crate::error::AggregationError;
use crate::handler::HandlerRegistry;
use crate::result::{
    AggregationOutput, AlternativePosition, ConsensusMetrics, ConsensusResult,
    EpistemicMetadata, ExpertDisagreement, UncertaintyMetrics, UncertaintyPreservingResult,
    CONSENSUS_STRENGTH_HIGH, UNCERTAINTY_SOURCES,
};
use crate::Result;

/// Parameters of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationSettings {
    /// τ: δ above this selects the uncertainty-preserving output.
    pub disagreement_threshold: f64,
    /// Supporter names listed per alternative position.
    pub max_listed_supporters: usize,
    /// Research suggestions derived from contention points.
    pub max_research_suggestions: usize,
    /// Field entropy above which a field is a contention point.
    pub contention_entropy_threshold: f64,
}

impl From<&RlcfConfig> for AggregationSettings {
    fn from(config: &RlcfConfig) -> Self {
        Self {
            disagreement_threshold: config.aggregation.disagreement_threshold,
            max_listed_supporters: config.aggregation.max_listed_supporters,
            max_research_suggestions: config.aggregation.max_research_suggestions,
            contention_entropy_threshold: config.analysis.contention_entropy_threshold,
        }
    }
}

/// Authority-weighted aggregator over an injected store.
///
/// Cloning is cheap when the store handle is; clones may aggregate different
/// tasks in parallel.
#[derive(Debug, Clone)]
pub struct Aggregator<S> {
    store: S,
    handlers: Arc<HandlerRegistry>,
    settings: AggregationSettings,
    analyzer: ConsensusAnalyzer,
    classifier: ReasoningClassifier,
}

impl<S: FeedbackStore + UserStore> Aggregator<S> {
    /// Creates an aggregator.
    ///
    /// # Arguments
    ///
    /// * `store` - Source of tasks, feedback and users
    /// * `handlers` - Task-type handlers producing the consensus answer
    /// * `settings` - Threshold and output limits
    pub fn new(store: S, handlers: Arc<HandlerRegistry>, settings: AggregationSettings) -> Self {
        Self {
            store,
            handlers,
            analyzer: ConsensusAnalyzer::new(settings.contention_entropy_threshold),
            classifier: ReasoningClassifier::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// Aggregates the feedback set of `task_id`.
    ///
    /// Re-running without intervening feedback changes yields an identical
    /// result.
    ///
    /// # Errors
    ///
    /// - [`AggregationError::NotFound`] if the task does not exist
    /// - [`AggregationError::NoFeedback`] if it has no feedback
    /// - [`AggregationError::Handler`] if no handler is registered for the
    ///   task type or the handler rejects the feedback
    /// - [`AggregationError::Store`] if the store fails
    #[instrument(skip(self))]
    pub fn aggregate(&self, task_id: u64) -> Result<AggregationOutput> {
        let task = self
            .store
            .get_task(task_id)?
            .ok_or(AggregationError::NotFound(task_id))?;

        let feedback = self.store.get_feedback_for_task(task_id)?;
        if feedback.is_empty() {
            return Err(AggregationError::NoFeedback(task_id));
        }

        let judgments = resolve_judgments(&self.store, &feedback)?;

        let handler = self.handlers.get_handler(task.task_type).ok_or_else(|| {
            AggregationError::Handler(format!(
                "no handler registered for task type {}",
                task.task_type
            ))
        })?;
        let handled = handler
            .aggregate_feedback(&task, &judgments)
            .map_err(AggregationError::Handler)?;

        let positions = extract_positions(&judgments);
        let delta = disagreement_score(&positions.weights());
        debug!(
            task_id,
            positions = positions.len(),
            disagreement = delta,
            "positions scored"
        );

        let output = if delta <= self.settings.disagreement_threshold {
            AggregationOutput::Consensus(ConsensusResult {
                consensus_answer: handled.consensus_answer,
                confidence_level: round_to(1.0 - delta, 2),
                transparency_metrics: ConsensusMetrics {
                    evaluator_count: judgments.len(),
                    consensus_strength: CONSENSUS_STRENGTH_HIGH.to_string(),
                    disagreement_score: round_to(delta, 3),
                },
            })
        } else {
            let total = positions.total_weight();
            let alternative_positions = positions
                .ranked()
                .iter()
                .skip(1)
                .map(|position| self.alternative(position, total))
                .collect();

            let analysis = self.analyzer.analyze(&judgments);
            let suggested_research = analysis
                .contention_points
                .iter()
                .take(self.settings.max_research_suggestions)
                .map(|point| {
                    format!(
                        "Further investigate {} - disagreement level: {:.2}",
                        point.aspect, point.disagreement_level
                    )
                })
                .collect();

            AggregationOutput::UncertaintyPreserving(UncertaintyPreservingResult {
                primary_answer: handled.consensus_answer,
                confidence_level: round_to(1.0 - delta, 2),
                alternative_positions,
                expert_disagreement: ExpertDisagreement {
                    consensus_areas: analysis.consensus_areas,
                    contention_points: analysis.contention_points,
                    reasoning_patterns: self.classifier.classify(&judgments),
                },
                epistemic_metadata: EpistemicMetadata {
                    uncertainty_sources: UNCERTAINTY_SOURCES.iter().map(|s| s.to_string()).collect(),
                    suggested_research,
                },
                transparency_metrics: UncertaintyMetrics {
                    evaluator_count: judgments.len(),
                    total_authority_weight: total,
                    disagreement_score: round_to(delta, 3),
                },
            })
        };

        info!(
            task_id,
            task_type = %task.task_type,
            evaluators = judgments.len(),
            disagreement = delta,
            consensus = output.is_consensus(),
            "task aggregated"
        );
        Ok(output)
    }

    fn alternative(&self, position: &Position, total: f64) -> AlternativePosition {
        AlternativePosition {
            position: position.key.clone(),
            support: support_label(position.weight, total),
            supporters: position
                .supporters
                .iter()
                .take(self.settings.max_listed_supporters)
                .map(|s| s.display_name.clone())
                .collect(),
            reasoning: position
                .supporters
                .first()
                .map(|s| s.rationale_text.clone())
                .unwrap_or_default(),
        }
    }
}

/// Attaches an authority weight and display name to every feedback entry.
///
/// The weight is the feedback's authority snapshot if it has one, otherwise
/// the evaluator's cached authority, otherwise 0.0 for an unknown evaluator.
/// Weights are clamped into [0, 1].
pub fn resolve_judgments<S: UserStore>(
    store: &S,
    feedback: &[Feedback],
) -> std::result::Result<Vec<Judgment>, StoreError> {
    let mut judgments = Vec::with_capacity(feedback.len());
    for entry in feedback {
        let user = store.get_user(entry.user_id)?;
        let (display_name, cached) = match &user {
            Some(user) => (user.username.clone(), Some(user.authority_score)),
            None => (format!("user-{}", entry.user_id), None),
        };

        let authority = match entry.authority.or(cached) {
            Some(authority) => authority,
            None => {
                warn!(
                    feedback_id = entry.id,
                    user_id = entry.user_id,
                    "unknown evaluator, counting feedback with zero weight"
                );
                0.0
            }
        };

        judgments.push(Judgment::new(
            entry.user_id,
            display_name,
            clamp_unit(authority),
            entry.feedback_data.clone(),
        ));
    }
    Ok(judgments)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn support_label(weight: f64, total: f64) -> String {
    let share = if total > 0.0 { 100.0 * weight / total } else { 0.0 };
    format!("{:.1}%", share)
}
