//! # RLCF Consensus
//!
//! Pure analyses over a set of authority-weighted judgments. Nothing here
//! touches storage and every operation is total: bad weights are read as
//! zero, empty inputs produce empty outputs.
//!
//! ## Pipeline
//!
//! ```text
//!  judgments ──► extract_positions ──► weights ──► disagreement_score ──► δ
//!      │                                                                  │
//!      │                     (only when δ exceeds the gate)               │
//!      ├──► ConsensusAnalyzer::analyze ──► consensus areas / contention ◄─┘
//!      └──► ReasoningClassifier::classify ──► label → evaluator ids
//! ```
//!
//! | Module | Entropy | Role |
//! |--------|---------|------|
//! | [`disagreement`] | base N (positions), normalized | gating signal |
//! | [`analysis`] | base 2, unnormalized | per-field diagnostic |
//!
//! The two entropy conventions are separate functions on purpose: the
//! aggregation threshold is calibrated against the normalized form only.
//!
//! ## Usage
//!
//! ```rust
//! use rlcf_consensus::{disagreement_score, extract_positions, Judgment};
//! use serde_json::json;
//!
//! let yes = json!({ "answer": "yes" }).as_object().cloned().unwrap();
//! let no = json!({ "answer": "no" }).as_object().cloned().unwrap();
//! let positions = extract_positions(&[
//!     Judgment::new(1, "ada", 0.8, yes),
//!     Judgment::new(2, "bob", 0.7, no),
//! ]);
//! assert_eq!(positions.len(), 2);
//! assert!(disagreement_score(&positions.weights()) > 0.99);
//! ```

pub mod agreement;
pub mod analysis;
pub mod canonicalize;
pub mod disagreement;
pub mod position;
pub mod reasoning;

pub use agreement::peer_agreement;
pub use analysis::{
    field_entropy, ConsensusAnalysis, ConsensusAnalyzer, ContentionPoint,
    DEFAULT_CONTENTION_THRESHOLD,
};
pub use canonicalize::{canonical_key, canonicalize, value_label};
pub use disagreement::{disagreement_score, normalized_entropy};
pub use position::{
    extract_positions, sanitize_weight, Judgment, Position, PositionKey, Positions, Supporter,
    REASONING_FIELD,
};
pub use reasoning::{PatternLabel, ReasoningClassifier, ReasoningPattern};
