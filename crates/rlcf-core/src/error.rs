//! Error types for RLCF aggregation.

use rlcf_authority::AuthorityError;
use rlcf_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard stops of an aggregation run.
///
/// Everything after the feedback lookup is total; the only other failure is
/// a task handler refusing the feedback set.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// No task with this id.
    #[error("task {0} not found")]
    NotFound(u64),

    /// The task exists but nobody has evaluated it yet.
    #[error("task {0} has no feedback to aggregate")]
    NoFeedback(u64),

    /// The task-type handler failed; its message is kept verbatim.
    #[error("{0}")]
    Handler(String),

    /// Store failure passthrough.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Wire name of an [`AggregationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NoFeedback,
    HandlerError,
    Storage,
}

impl AggregationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AggregationError::NotFound(_) => ErrorKind::NotFound,
            AggregationError::NoFeedback(_) => ErrorKind::NoFeedback,
            AggregationError::Handler(_) => ErrorKind::HandlerError,
            AggregationError::Store(_) => ErrorKind::Storage,
        }
    }
}

/// Failures of a peer-agreement authority pass over one task.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The task could not be read or has nothing to reconcile.
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// An individual authority update was rejected.
    #[error("authority update failed: {0}")]
    Authority(#[from] AuthorityError),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::Aggregation(AggregationError::Store(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AggregationError::NotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(AggregationError::NoFeedback(1).kind(), ErrorKind::NoFeedback);
        assert_eq!(
            AggregationError::Handler("boom".into()).kind(),
            ErrorKind::HandlerError
        );
        assert_eq!(
            AggregationError::Store(StoreError::InvalidInput("x".into())).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_handler_message_is_verbatim() {
        assert_eq!(
            AggregationError::Handler("no answer field".into()).to_string(),
            "no answer field"
        );
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(ErrorKind::HandlerError).unwrap(),
            serde_json::json!("handler_error")
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::NoFeedback).unwrap(),
            serde_json::json!("no_feedback")
        );
    }
}
