//! # RLCF Authority
//!
//! Reputation model deciding how much each evaluator's opinion counts.
//!
//! ## Model
//!
//! ```text
//! A_u(t) = α·B_u + β·T_u(t-1) + γ·P_u(t)        defaults: α=0.3 β=0.5 γ=0.2
//! ```
//!
//! | Component | Module | Behaviour |
//! |-----------|--------|-----------|
//! | Baseline B_u | [`baseline`] | weighted mean of credential values, static per user |
//! | Track record T_u | [`track_record`] | EWMA of feedback quality |
//! | Peer recognition P_u | caller supplied | agreement of peers with the user's position |
//! | Blend | [`AuthorityCalculator`] | persisted through an injected [`rlcf_store::UserStore`] |
//!
//! ## Guarantees
//!
//! - Inputs outside `[0, 1]` are rejected, never clamped
//! - Outputs are clamped into `[0, 1]`
//! - Updates are applied through the store's optimistic update, so two
//!   concurrent updates for one user both land

pub mod baseline;
mod calculator;
mod error;
pub mod track_record;

pub use baseline::{credential_baseline, CredentialFilter};
pub use calculator::{AuthorityCalculator, AuthorityWeights, UpdatedAuthority};
pub use error::{AuthorityError, Result};
pub use track_record::TrackRecord;
