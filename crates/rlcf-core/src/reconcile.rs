//! Peer-agreement authority updates.
//!
//! After a task has been evaluated, each evaluator's authority is updated
//! from two signals taken from that task:
//!
//! | Signal | Source |
//! |--------|--------|
//! | feedback quality | mean of accuracy, utility and transparency over the evaluator's feedback |
//! | peer agreement | share of other evaluators' weight on the evaluator's position |
//!
//! Evaluators without weighted peers have no agreement signal and are
//! skipped.

use std::collections::BTreeMap;

use rlcf_authority::{AuthorityCalculator, UpdatedAuthority};
use rlcf_consensus::{extract_positions, peer_agreement};
use rlcf_store::{FeedbackStore, UserStore};
use tracing::{debug, info, instrument};

use crate::aggregator::resolve_judgments;
use crate::error::{AggregationError, ReconcileError};

/// Applies one authority update per evaluator of `task_id`.
///
/// Returns the updates in order of each evaluator's first feedback.
///
/// # Errors
///
/// - `NotFound` / `NoFeedback` as for aggregation
/// - [`ReconcileError::Authority`] if an update is rejected; updates applied
///   before the failure stay applied
#[instrument(skip(store, calculator))]
pub fn reconcile_task<S, U>(
    store: &S,
    calculator: &AuthorityCalculator<U>,
    task_id: u64,
) -> Result<Vec<UpdatedAuthority>, ReconcileError>
where
    S: FeedbackStore + UserStore,
    U: UserStore,
{
    if store.get_task(task_id)?.is_none() {
        return Err(AggregationError::NotFound(task_id).into());
    }
    let feedback = store.get_feedback_for_task(task_id)?;
    if feedback.is_empty() {
        return Err(AggregationError::NoFeedback(task_id).into());
    }

    let positions = extract_positions(&resolve_judgments(store, &feedback)?);

    let mut order = Vec::new();
    let mut qualities: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
    for entry in &feedback {
        let scores = qualities.entry(entry.user_id).or_default();
        if scores.is_empty() {
            order.push(entry.user_id);
        }
        scores.push(entry.quality_score());
    }

    let mut updates = Vec::new();
    for user_id in order {
        let Some(agreement) = peer_agreement(&positions, user_id) else {
            debug!(task_id, user_id, "no weighted peers, skipping");
            continue;
        };
        let scores = qualities.get(&user_id).map(Vec::as_slice).unwrap_or_default();
        let quality = scores.iter().sum::<f64>() / scores.len().max(1) as f64;
        updates.push(calculator.update_authority(user_id, quality.clamp(0.0, 1.0), agreement)?);
    }

    info!(task_id, updated = updates.len(), "authority reconciled");
    Ok(updates)
}
