//! # RLCF Core
//!
//! Authority-weighted aggregation of community feedback. Turns a set of
//! independent, possibly conflicting expert judgments on one task into
//! either a single consensus answer or a report that preserves the spread of
//! expert positions.
//!
//! ## Components
//!
//! | Layer | Crate / module | Role |
//! |-------|----------------|------|
//! | Storage | `rlcf_store` | tasks, responses, feedback, users |
//! | Authority | `rlcf_authority` | how much each evaluator counts |
//! | Analysis | `rlcf_consensus` | positions, δ, field diagnostics, reasoning styles |
//! | Handlers | [`handler`] | task-type consensus answer |
//! | Orchestration | [`Aggregator`] | the aggregation pipeline |
//! | Feedback loop | [`reconcile_task`] | peer agreement back into authority |
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use rlcf_core::{AggregationResult, AggregationSettings, Aggregator, HandlerRegistry, RlcfConfig};
//! use rlcf_store::Storage;
//!
//! let config = RlcfConfig::default();
//! let aggregator = Aggregator::new(
//!     Storage::temporary().unwrap(),
//!     Arc::new(HandlerRegistry::default_registry()),
//!     AggregationSettings::from(&config),
//! );
//!
//! let result = AggregationResult::from(aggregator.aggregate(42));
//! assert!(result.is_error());
//! ```
//!
//! ## Guarantees
//!
//! - Missing task and empty feedback are the only hard stops besides a
//!   failing handler; everything downstream is total
//! - Aggregation never writes: the same snapshot always yields the same output
//! - δ, confidence and every authority weight stay in `[0, 1]`

mod aggregator;
mod config;
mod error;
pub mod handler;
mod reconcile;
mod result;

pub use aggregator::{resolve_judgments, AggregationSettings, Aggregator};
pub use config::{
    AggregationConfig, AnalysisConfig, AuthorityConfig, ConfigError, RlcfConfig, StorageConfig,
};
pub use error::{AggregationError, ErrorKind, ReconcileError};
pub use handler::{HandlerOutput, HandlerRegistry, TaskHandler, WeightedMajorityHandler};
pub use reconcile::reconcile_task;
pub use result::{
    AggregationOutput, AggregationResult, AlternativePosition, ConsensusMetrics, ConsensusResult,
    EpistemicMetadata, ErrorResult, ExpertDisagreement, UncertaintyMetrics,
    UncertaintyPreservingResult, CONSENSUS_STRENGTH_HIGH, UNCERTAINTY_SOURCES,
};

/// Result type for aggregation.
pub type Result<T> = std::result::Result<T, AggregationError>;

#[cfg(test)]
mod tests;
