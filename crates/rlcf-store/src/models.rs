//! # Core Data Models
//!
//! Persisted entities of the RLCF workflow: users and their credentials,
//! tasks, generated responses and the feedback evaluators submit on them.
//!
//! ## Ownership
//!
//! | Entity | Created by | Mutated by |
//! |--------|------------|------------|
//! | [`User`] | identity subsystem | authority calculator only |
//! | [`Credential`] | identity subsystem | never (append-only) |
//! | [`Task`] | task authoring | status transitions only |
//! | [`Response`] | generation | never |
//! | [`Feedback`] | evaluators | never |
//!
//! Positions are derived from feedback on every aggregation and are not
//! modelled here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema-less feedback/task payload.
///
/// `serde_json::Map` without `preserve_order` is ordered by key, so two
/// payloads with the same pairs serialize identically.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Tier of a credential, used to scope authority lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialLevel {
    /// Entry-level qualification (e.g. a first degree).
    Foundational,
    /// Practising professional qualification.
    Professional,
    /// Recognised expert (senior practitioner, doctorate, judiciary).
    Expert,
}

impl Default for CredentialLevel {
    fn default() -> Self {
        CredentialLevel::Foundational
    }
}

impl fmt::Display for CredentialLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialLevel::Foundational => write!(f, "foundational"),
            CredentialLevel::Professional => write!(f, "professional"),
            CredentialLevel::Expert => write!(f, "expert"),
        }
    }
}

impl std::str::FromStr for CredentialLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "foundational" => Ok(CredentialLevel::Foundational),
            "professional" => Ok(CredentialLevel::Professional),
            "expert" => Ok(CredentialLevel::Expert),
            other => Err(format!("unknown credential level '{}'", other)),
        }
    }
}

/// A declared qualification contributing to a user's baseline score.
///
/// `value` is the normalized strength of the credential in `[0, 1]`;
/// `weight` is its relative importance when several credentials are
/// combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential family, e.g. `ACADEMIC_DEGREE` or `PROFESSIONAL_EXPERIENCE`.
    pub credential_type: String,
    /// Normalized strength in `[0, 1]`.
    pub value: f64,
    /// Relative weight, `>= 0`.
    pub weight: f64,
    /// Legal domain the credential applies to, if it is domain specific.
    #[serde(default)]
    pub domain: Option<String>,
    /// Tier of the credential.
    #[serde(default)]
    pub level: CredentialLevel,
}

impl Credential {
    /// Creates a credential with no domain at the foundational level.
    pub fn new(credential_type: impl Into<String>, value: f64, weight: f64) -> Self {
        Self {
            credential_type: credential_type.into(),
            value,
            weight,
            domain: None,
            level: CredentialLevel::default(),
        }
    }

    /// Scopes the credential to a domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the credential level.
    pub fn with_level(mut self, level: CredentialLevel) -> Self {
        self.level = level;
        self
    }
}

/// An evaluator and their cached reputation components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned id.
    pub id: u64,
    /// Display name shown next to supported positions.
    pub username: String,
    /// Current authority A_u in `[0, 1]`.
    pub authority_score: f64,
    /// Static baseline B_u derived from credentials.
    pub baseline_credential_score: f64,
    /// Track record T_u, updated after each evaluated contribution.
    pub track_record_score: f64,
    /// Most recent peer recognition P_u.
    pub peer_recognition_score: f64,
    /// Append-only credential list.
    pub credentials: Vec<Credential>,
    /// Optimistic concurrency token, bumped on every write.
    pub version: u64,
}

impl User {
    /// Creates a user with zeroed scores.
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            authority_score: 0.0,
            baseline_credential_score: 0.0,
            track_record_score: 0.0,
            peer_recognition_score: 0.0,
            credentials: Vec::new(),
            version: 0,
        }
    }
}

/// Family of a task; selects the feedback schema and consensus handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Qa,
    StatutoryRuleQa,
    Classification,
    Summarization,
    Prediction,
    Nli,
    Ner,
    Drafting,
    RiskSpotting,
    DoctrineApplication,
}

impl TaskType {
    /// All task types, in declaration order.
    pub const ALL: [TaskType; 10] = [
        TaskType::Qa,
        TaskType::StatutoryRuleQa,
        TaskType::Classification,
        TaskType::Summarization,
        TaskType::Prediction,
        TaskType::Nli,
        TaskType::Ner,
        TaskType::Drafting,
        TaskType::RiskSpotting,
        TaskType::DoctrineApplication,
    ];

    /// Wire name of the task type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Qa => "QA",
            TaskType::StatutoryRuleQa => "STATUTORY_RULE_QA",
            TaskType::Classification => "CLASSIFICATION",
            TaskType::Summarization => "SUMMARIZATION",
            TaskType::Prediction => "PREDICTION",
            TaskType::Nli => "NLI",
            TaskType::Ner => "NER",
            TaskType::Drafting => "DRAFTING",
            TaskType::RiskSpotting => "RISK_SPOTTING",
            TaskType::DoctrineApplication => "DOCTRINE_APPLICATION",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task.
///
/// ```text
/// OPEN ──▶ BLIND_EVALUATION ──▶ AGGREGATED ──▶ CLOSED
///   │              │
///   └──────────────┴──▶ REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Open,
    BlindEvaluation,
    Aggregated,
    Closed,
    Rejected,
}

impl TaskStatus {
    /// Returns true if the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Open, TaskStatus::BlindEvaluation)
                | (TaskStatus::Open, TaskStatus::Rejected)
                | (TaskStatus::BlindEvaluation, TaskStatus::Aggregated)
                | (TaskStatus::BlindEvaluation, TaskStatus::Rejected)
                | (TaskStatus::Aggregated, TaskStatus::Closed)
        )
    }

    /// Returns true for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Closed | TaskStatus::Rejected)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Open => "OPEN",
            TaskStatus::BlindEvaluation => "BLIND_EVALUATION",
            TaskStatus::Aggregated => "AGGREGATED",
            TaskStatus::Closed => "CLOSED",
            TaskStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// A unit of work submitted for community evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned id.
    pub id: u64,
    /// Task family.
    pub task_type: TaskType,
    /// Task input (question, contract clause, ...).
    pub input_data: Payload,
    /// Lifecycle state.
    pub status: TaskStatus,
}

/// A generated candidate answer for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Store-assigned id.
    pub id: u64,
    /// Owning task.
    pub task_id: u64,
    /// The generated output being evaluated.
    pub output_data: Payload,
    /// Identifier of the model that produced the output.
    pub model_version: String,
}

/// One evaluator's judgment on a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Store-assigned id.
    pub id: u64,
    /// Response being judged.
    pub response_id: u64,
    /// Evaluator.
    pub user_id: u64,
    /// Task-type specific judgment fields.
    pub feedback_data: Payload,
    /// Perceived accuracy of the response, `[0, 1]`.
    pub accuracy_score: f64,
    /// Perceived utility of the response, `[0, 1]`.
    pub utility_score: f64,
    /// Perceived transparency of the response, `[0, 1]`.
    pub transparency_score: f64,
    /// Authority snapshot taken at submission; resolved at aggregation if absent.
    #[serde(default)]
    pub authority: Option<f64>,
}

impl Feedback {
    /// Mean of the three quality scores.
    pub fn quality_score(&self) -> f64 {
        (self.accuracy_score + self.utility_score + self.transparency_score) / 3.0
    }
}

/// Feedback as submitted, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    /// Response being judged.
    pub response_id: u64,
    /// Evaluator.
    pub user_id: u64,
    /// Task-type specific judgment fields.
    pub feedback_data: Payload,
    /// Accuracy score in `[0, 1]`.
    pub accuracy_score: f64,
    /// Utility score in `[0, 1]`.
    pub utility_score: f64,
    /// Transparency score in `[0, 1]`.
    pub transparency_score: f64,
    /// Optional authority snapshot in `[0, 1]`.
    #[serde(default)]
    pub authority: Option<f64>,
}

impl NewFeedback {
    /// Creates feedback with neutral quality scores and no authority snapshot.
    pub fn new(response_id: u64, user_id: u64, feedback_data: Payload) -> Self {
        Self {
            response_id,
            user_id,
            feedback_data,
            accuracy_score: 0.5,
            utility_score: 0.5,
            transparency_score: 0.5,
            authority: None,
        }
    }

    /// Sets the three quality scores.
    pub fn with_scores(mut self, accuracy: f64, utility: f64, transparency: f64) -> Self {
        self.accuracy_score = accuracy;
        self.utility_score = utility;
        self.transparency_score = transparency;
        self
    }

    /// Captures an authority snapshot.
    pub fn with_authority(mut self, authority: f64) -> Self {
        self.authority = Some(authority);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_type_wire_names() {
        for task_type in TaskType::ALL {
            let json = serde_json::to_string(&task_type).unwrap();
            assert_eq!(json, format!("\"{}\"", task_type.as_str()));
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(TaskStatus::Open.can_transition_to(TaskStatus::BlindEvaluation));
        assert!(TaskStatus::BlindEvaluation.can_transition_to(TaskStatus::Aggregated));
        assert!(TaskStatus::Aggregated.can_transition_to(TaskStatus::Closed));
        assert!(!TaskStatus::Open.can_transition_to(TaskStatus::Aggregated));
        assert!(!TaskStatus::Closed.can_transition_to(TaskStatus::Open));
        assert!(!TaskStatus::Rejected.can_transition_to(TaskStatus::BlindEvaluation));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Closed.is_terminal());
        assert!(TaskStatus::Rejected.is_terminal());
        assert!(!TaskStatus::Aggregated.is_terminal());
    }

    #[test]
    fn test_credential_level_ordering() {
        assert!(CredentialLevel::Expert > CredentialLevel::Professional);
        assert!(CredentialLevel::Professional > CredentialLevel::Foundational);
        assert_eq!("Expert".parse::<CredentialLevel>().unwrap(), CredentialLevel::Expert);
        assert!("guru".parse::<CredentialLevel>().is_err());
    }

    #[test]
    fn test_feedback_quality_score() {
        let feedback = Feedback {
            id: 1,
            response_id: 1,
            user_id: 1,
            feedback_data: Payload::new(),
            accuracy_score: 0.9,
            utility_score: 0.6,
            transparency_score: 0.3,
            authority: None,
        };
        assert!((feedback.quality_score() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_payload_serializes_sorted() {
        let mut a = Payload::new();
        a.insert("z".to_string(), json!(1));
        a.insert("a".to_string(), json!(2));
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"a":2,"z":1}"#);
    }
}
