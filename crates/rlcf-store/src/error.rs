//! Error types for the RLCF store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while reading or writing persisted RLCF state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying sled database failure.
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity ("task", "user", ...).
        entity: &'static str,
        /// The id that was looked up.
        id: u64,
    },

    /// Feedback payload does not match the schema of its task type.
    #[error("feedback does not match {task_type} schema: {reason}")]
    SchemaViolation {
        /// Task type whose schema was applied.
        task_type: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// A numeric input was out of range or otherwise malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Task lifecycle transition is not allowed.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task being updated.
        task_id: u64,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A stored record or index entry has an unexpected shape.
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// Optimistic update lost the race too many times.
    #[error("concurrent update conflict on {entity} {id} after {attempts} attempts")]
    Conflict {
        /// Kind of entity being updated.
        entity: &'static str,
        /// Entity id.
        id: u64,
        /// Number of compare-and-swap attempts made.
        attempts: usize,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: u64) -> Self {
        StoreError::NotFound { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("task", 42);
        assert_eq!(err.to_string(), "task 42 not found");
    }

    #[test]
    fn test_schema_violation_display() {
        let err = StoreError::SchemaViolation {
            task_type: "QA".to_string(),
            reason: "missing field 'position'".to_string(),
        };
        assert!(err.to_string().contains("QA"));
        assert!(err.to_string().contains("position"));
    }

    #[test]
    fn test_conflict_display() {
        let err = StoreError::Conflict {
            entity: "user",
            id: 7,
            attempts: 16,
        };
        assert!(err.to_string().contains("user 7"));
        assert!(err.to_string().contains("16"));
    }
}
