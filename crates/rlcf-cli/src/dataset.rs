//! JSON dataset import.
//!
//! Ids in a dataset are local references (`"ref"`) resolved to store ids on
//! import, so the same file can be loaded into any database.
//!
//! ```json
//! {
//!   "users": [
//!     { "ref": "ada", "username": "Ada", "authority_score": 0.8,
//!       "credentials": [{ "credential_type": "PHD", "value": 1.0, "weight": 1.0 }] }
//!   ],
//!   "tasks": [
//!     { "ref": "t1", "task_type": "QA", "input_data": { "question": "..." },
//!       "responses": [
//!         { "output_data": { "answer": "..." }, "model_version": "m1",
//!           "feedback": [
//!             { "user": "ada", "feedback_data": { "validated_answer": "...", "position": "correct" } }
//!           ] }
//!       ] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use rlcf_authority::AuthorityCalculator;
use rlcf_store::{
    Credential, NewFeedback, NewUser, Payload, Storage, TaskStatus, TaskType,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<DatasetUser>,
    #[serde(default)]
    pub tasks: Vec<DatasetTask>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetUser {
    #[serde(rename = "ref")]
    pub reference: String,
    pub username: String,
    /// Cached A_u; derived from credentials and track record when absent.
    pub authority_score: Option<f64>,
    #[serde(default)]
    pub track_record_score: f64,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetTask {
    #[serde(rename = "ref")]
    pub reference: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub input_data: Payload,
    #[serde(default)]
    pub responses: Vec<DatasetResponse>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetResponse {
    #[serde(default)]
    pub output_data: Payload,
    #[serde(default)]
    pub model_version: String,
    #[serde(default)]
    pub feedback: Vec<DatasetFeedback>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetFeedback {
    /// `ref` of the evaluating user.
    pub user: String,
    pub feedback_data: Payload,
    #[serde(default = "neutral")]
    pub accuracy_score: f64,
    #[serde(default = "neutral")]
    pub utility_score: f64,
    #[serde(default = "neutral")]
    pub transparency_score: f64,
    /// Authority snapshot; resolved at aggregation time when absent.
    pub authority: Option<f64>,
}

fn neutral() -> f64 {
    0.5
}

/// Local reference → store id.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub users: BTreeMap<String, u64>,
    pub tasks: BTreeMap<String, u64>,
    pub responses: usize,
    pub feedback: usize,
}

/// Loads `dataset` into `storage`.
///
/// # Arguments
///
/// * `storage` - Target database
/// * `calculator` - Derives B_u and the starting A_u of imported users
/// * `dataset` - Parsed dataset
///
/// # Returns
///
/// The mapping from local references to store ids.
///
/// Users without an explicit `authority_score` get A_u blended from their
/// credential baseline and track record. Imported tasks are moved to
/// `BLIND_EVALUATION` once their feedback is in. The import is not
/// transactional: records written before a failure stay.
pub fn import(
    storage: &Storage,
    calculator: &AuthorityCalculator<&Storage>,
    dataset: Dataset,
) -> anyhow::Result<ImportReport> {
    let mut report = ImportReport::default();

    for user in dataset.users {
        let mut new_user = NewUser::new(user.username)
            .with_authority(user.authority_score.unwrap_or(0.0))
            .with_track_record(user.track_record_score);
        for credential in user.credentials {
            new_user = new_user.with_credential(credential);
        }
        let created = storage
            .create_user(new_user)
            .with_context(|| format!("importing user '{}'", user.reference))?;

        if user.authority_score.is_none() {
            calculator
                .recompute_baseline(created.id)
                .with_context(|| format!("scoring user '{}'", user.reference))?;
        }
        report.users.insert(user.reference, created.id);
    }

    for task in dataset.tasks {
        let created = storage
            .create_task(task.task_type, task.input_data)
            .with_context(|| format!("importing task '{}'", task.reference))?;

        for response in task.responses {
            let stored = storage.create_response(
                created.id,
                response.output_data,
                response.model_version,
            )?;
            report.responses += 1;

            for entry in response.feedback {
                let user_id = *report.users.get(&entry.user).ok_or_else(|| {
                    anyhow!(
                        "task '{}': feedback references unknown user '{}'",
                        task.reference,
                        entry.user
                    )
                })?;
                let mut new_feedback =
                    NewFeedback::new(stored.id, user_id, entry.feedback_data).with_scores(
                        entry.accuracy_score,
                        entry.utility_score,
                        entry.transparency_score,
                    );
                if let Some(authority) = entry.authority {
                    new_feedback = new_feedback.with_authority(authority);
                }
                storage
                    .submit_feedback(new_feedback)
                    .with_context(|| format!("importing feedback on task '{}'", task.reference))?;
                report.feedback += 1;
            }
        }

        storage.set_task_status(created.id, TaskStatus::BlindEvaluation)?;
        report.tasks.insert(task.reference, created.id);
    }

    storage.flush()?;
    info!(
        users = report.users.len(),
        tasks = report.tasks.len(),
        feedback = report.feedback,
        "dataset imported"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlcf_authority::{AuthorityWeights, TrackRecord};
    use rlcf_core::{AggregationSettings, Aggregator, HandlerRegistry, RlcfConfig};
    use rlcf_store::{FeedbackStore, UserStore};
    use std::sync::Arc;

    fn calculator(storage: &Storage) -> AuthorityCalculator<&Storage> {
        AuthorityCalculator::new(
            storage,
            AuthorityWeights::new(0.3, 0.5, 0.2).unwrap(),
            TrackRecord::new(0.05).unwrap(),
        )
    }

    fn load(storage: &Storage, json: &str) -> anyhow::Result<ImportReport> {
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        import(storage, &calculator(storage), dataset)
    }

    const DATASET: &str = r#"{
        "users": [
            { "ref": "ada", "username": "Ada", "authority_score": 0.8,
              "credentials": [{ "credential_type": "PHD", "value": 1.0, "weight": 1.0, "level": "expert" }] },
            { "ref": "bob", "username": "Bob", "authority_score": 0.7 }
        ],
        "tasks": [
            { "ref": "t1", "task_type": "NLI", "input_data": { "premise": "p", "hypothesis": "h" },
              "responses": [
                { "output_data": { "label": "entailment" }, "model_version": "m1",
                  "feedback": [
                    { "user": "ada", "feedback_data": { "chosen_label": "entailment" } },
                    { "user": "bob", "feedback_data": { "chosen_label": "neutral" }, "authority": 0.4 }
                  ] }
              ] }
        ]
    }"#;

    #[test]
    fn test_import() {
        let storage = Storage::temporary().unwrap();
        let report = load(&storage, DATASET).unwrap();

        assert_eq!(report.users.len(), 2);
        assert_eq!(report.responses, 1);
        assert_eq!(report.feedback, 2);

        let task_id = report.tasks["t1"];
        let task = storage.get_task(task_id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::BlindEvaluation);

        let feedback = storage.get_feedback_for_task(task_id).unwrap();
        assert_eq!(feedback.len(), 2);
        assert_eq!(feedback[0].user_id, report.users["ada"]);
        assert_eq!(feedback[1].authority, Some(0.4));
        assert!((feedback[0].accuracy_score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_user_reference() {
        let storage = Storage::temporary().unwrap();
        let err = load(
            &storage,
            r#"{ "tasks": [{ "ref": "t", "task_type": "NLI",
                 "responses": [{ "feedback": [{ "user": "ghost", "feedback_data": { "chosen_label": "x" } }] }] }] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_schema_violation_is_reported() {
        let storage = Storage::temporary().unwrap();
        let err = load(
            &storage,
            r#"{ "users": [{ "ref": "u", "username": "U" }],
                 "tasks": [{ "ref": "t", "task_type": "NLI",
                 "responses": [{ "feedback": [{ "user": "u", "feedback_data": { "answer": "x" } }] }] }] }"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("chosen_label"));
    }

    #[test]
    fn test_explicit_authority_is_kept() {
        let storage = Storage::temporary().unwrap();
        let report = load(&storage, DATASET).unwrap();
        let ada = storage.get_user(report.users["ada"]).unwrap().unwrap();
        assert!((ada.authority_score - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_credentialed_split_panel_is_not_consensus() {
        let storage = Storage::temporary().unwrap();
        let report = load(
            &storage,
            r#"{
                "users": [
                    { "ref": "ada", "username": "Ada",
                      "credentials": [{ "credential_type": "PHD", "value": 1.0, "weight": 1.0 }] },
                    { "ref": "bob", "username": "Bob",
                      "credentials": [{ "credential_type": "PHD", "value": 1.0, "weight": 1.0 }] }
                ],
                "tasks": [
                    { "ref": "t1", "task_type": "NLI",
                      "responses": [
                        { "feedback": [
                            { "user": "ada", "feedback_data": { "chosen_label": "entailment" } },
                            { "user": "bob", "feedback_data": { "chosen_label": "contradiction" } }
                        ] }
                      ] }
                ]
            }"#,
        )
        .unwrap();

        for id in report.users.values() {
            let user = storage.get_user(*id).unwrap().unwrap();
            assert!((user.baseline_credential_score - 1.0).abs() < 1e-12);
            // 0.3 * 1.0 + 0.5 * 0.0 + 0.2 * 0.0
            assert!((user.authority_score - 0.3).abs() < 1e-12);
        }

        let aggregator = Aggregator::new(
            storage.clone(),
            Arc::new(HandlerRegistry::default_registry()),
            AggregationSettings::from(&RlcfConfig::default()),
        );
        let output = aggregator.aggregate(report.tasks["t1"]).unwrap();
        assert!(!output.is_consensus());
        assert!(output.disagreement_score() > 0.4);
    }
}
