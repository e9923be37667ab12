//! Task-type handlers.
//!
//! A handler turns a task's weighted feedback into the provisional
//! `consensus_answer`. The aggregator does not interpret task-type semantics
//! itself; it looks up the handler for the task's type and reports whatever
//! it returns.
//!
//! The default registry installs a [`WeightedMajorityHandler`] for every
//! task type, using the answer fields of the type's feedback schema.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rlcf_consensus::{canonicalize, Judgment};
use rlcf_store::{FeedbackSchema, Task, TaskType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a handler produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerOutput {
    /// The handler's answer for the task.
    pub consensus_answer: Value,

    /// Handler-specific extras.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl HandlerOutput {
    pub fn new(consensus_answer: Value) -> Self {
        Self {
            consensus_answer,
            details: Map::new(),
        }
    }
}

/// Produces a consensus answer for one task type.
///
/// Receives judgments with authority weights already resolved. An `Err`
/// message is surfaced to the caller unchanged.
pub trait TaskHandler: Send + Sync {
    fn aggregate_feedback(&self, task: &Task, judgments: &[Judgment])
        -> Result<HandlerOutput, String>;
}

/// Picks, per answer field, the value with the greatest summed authority.
///
/// Ties go to the value with the smaller canonical form, so the answer does
/// not depend on feedback order.
#[derive(Debug, Clone)]
pub struct WeightedMajorityHandler {
    answer_fields: Vec<String>,
}

impl WeightedMajorityHandler {
    pub fn new<I, S>(answer_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answer_fields: answer_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Handler over the answer fields of `task_type`'s feedback schema.
    pub fn for_task_type(task_type: TaskType) -> Self {
        Self::new(FeedbackSchema::for_task_type(task_type).answer_fields.iter().copied())
    }

    pub fn answer_fields(&self) -> &[String] {
        &self.answer_fields
    }
}

impl TaskHandler for WeightedMajorityHandler {
    fn aggregate_feedback(
        &self,
        task: &Task,
        judgments: &[Judgment],
    ) -> Result<HandlerOutput, String> {
        let mut answer = Map::new();
        for field in &self.answer_fields {
            // canonical form -> (weight, value)
            let mut tally: BTreeMap<String, (f64, &Value)> = BTreeMap::new();
            for judgment in judgments {
                if let Some(value) = judgment.data.get(field) {
                    tally.entry(canonicalize(value)).or_insert((0.0, value)).0 +=
                        judgment.weight();
                }
            }

            // BTreeMap iterates in canonical order; keep the first maximum.
            let mut best: Option<(f64, &Value)> = None;
            for (weight, value) in tally.into_values() {
                if best.map_or(true, |(top, _)| weight > top) {
                    best = Some((weight, value));
                }
            }
            if let Some((_, value)) = best {
                answer.insert(field.clone(), value.clone());
            }
        }

        if answer.is_empty() {
            return Err(format!(
                "no answer field ({}) present in feedback for {} task {}",
                self.answer_fields.join(", "),
                task.task_type,
                task.id
            ));
        }
        Ok(HandlerOutput::new(Value::Object(answer)))
    }
}

/// Task type → handler lookup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a weighted-majority handler for every task type.
    pub fn default_registry() -> Self {
        let mut registry = Self::new();
        for task_type in TaskType::ALL {
            registry.register(task_type, WeightedMajorityHandler::for_task_type(task_type));
        }
        registry
    }

    /// Installs `handler` for `task_type`, replacing any previous one.
    pub fn register(&mut self, task_type: TaskType, handler: impl TaskHandler + 'static) {
        self.handlers.insert(task_type, Arc::new(handler));
    }

    pub fn get_handler(&self, task_type: TaskType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&TaskType> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("HandlerRegistry").field("task_types", &types).finish()
    }
}
