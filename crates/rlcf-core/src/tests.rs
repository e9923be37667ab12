//! Unit tests for rlcf-core.

use std::sync::Arc;

use rlcf_store::{NewFeedback, NewUser, Storage, TaskStatus, TaskType};
use serde_json::{json, Map, Value};

use crate::{AggregationError, AggregationSettings, Aggregator, HandlerRegistry, RlcfConfig};

fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn aggregator(storage: &Storage) -> Aggregator<Storage> {
    Aggregator::new(
        storage.clone(),
        Arc::new(HandlerRegistry::default_registry()),
        AggregationSettings::from(&RlcfConfig::default()),
    )
}

#[test]
fn test_missing_handler_is_handler_error() {
    let storage = Storage::temporary().unwrap();
    let user = storage.create_user(NewUser::new("ada")).unwrap();
    let task = storage.create_task(TaskType::Nli, Map::new()).unwrap();
    let response = storage.create_response(task.id, Map::new(), "m1").unwrap();
    storage
        .submit_feedback(NewFeedback::new(
            response.id,
            user.id,
            payload(json!({ "chosen_label": "entailment" })),
        ))
        .unwrap();

    let aggregator = Aggregator::new(
        storage.clone(),
        Arc::new(HandlerRegistry::new()),
        AggregationSettings::from(&RlcfConfig::default()),
    );
    let err = aggregator.aggregate(task.id).unwrap_err();
    assert!(matches!(err, AggregationError::Handler(ref m) if m.contains("NLI")));
}

#[test]
fn test_aggregation_does_not_change_status() {
    let storage = Storage::temporary().unwrap();
    let user = storage.create_user(NewUser::new("ada").with_authority(0.6)).unwrap();
    let task = storage.create_task(TaskType::Prediction, Map::new()).unwrap();
    let response = storage.create_response(task.id, Map::new(), "m1").unwrap();
    storage
        .submit_feedback(NewFeedback::new(
            response.id,
            user.id,
            payload(json!({ "chosen_outcome": "upheld" })),
        ))
        .unwrap();
    storage.set_task_status(task.id, TaskStatus::BlindEvaluation).unwrap();

    let output = aggregator(&storage).aggregate(task.id).unwrap();
    assert!(output.is_consensus());

    use rlcf_store::FeedbackStore;
    let stored = storage.get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::BlindEvaluation);
}

#[test]
fn test_aggregator_is_send_sync_clone() {
    fn assert_bounds<T: Send + Sync + Clone>() {}
    assert_bounds::<Aggregator<Storage>>();
}
