//! # Authority Calculator
//!
//! Blends three reputation components into a single trust weight:
//!
//! ```text
//! A_u(t) = α·B_u + β·T_u(t-1) + γ·P_u(t)
//! ```
//!
//! | Term | Meaning | Source |
//! |------|---------|--------|
//! | B_u | baseline credentials | [`credential_baseline`] |
//! | T_u(t-1) | track record before this update | stored on the user |
//! | P_u(t) | peer recognition now | the `peer_agreement` input |
//!
//! With α + β + γ = 1 and every term in `[0, 1]`, A_u stays in `[0, 1]`;
//! the result is clamped regardless.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use rlcf_store::{CredentialLevel, User, UserStore};

use crate::baseline::{credential_baseline, CredentialFilter};
use crate::error::{AuthorityError, Result};
use crate::track_record::TrackRecord;

/// Tolerance on α + β + γ = 1.
const COEFFICIENT_SUM_TOLERANCE: f64 = 1e-9;

/// Blend coefficients (α, β, γ).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthorityWeights {
    alpha: f64,
    beta: f64,
    gamma: f64,
}

impl AuthorityWeights {
    /// Creates validated coefficients.
    ///
    /// # Errors
    ///
    /// `InvalidCoefficients` if any coefficient is negative or not finite,
    /// or if they do not sum to 1.0.
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        for (name, value) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AuthorityError::InvalidCoefficients(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        let sum = alpha + beta + gamma;
        if (sum - 1.0).abs() > COEFFICIENT_SUM_TOLERANCE {
            return Err(AuthorityError::InvalidCoefficients(format!(
                "alpha + beta + gamma must equal 1.0, got {}",
                sum
            )));
        }
        Ok(Self { alpha, beta, gamma })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Computes A_u from its three components.
    pub fn blend(&self, baseline: f64, track_record: f64, peer_recognition: f64) -> f64 {
        (self.alpha * baseline + self.beta * track_record + self.gamma * peer_recognition)
            .clamp(0.0, 1.0)
    }
}

/// Outcome of an authority update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedAuthority {
    pub user_id: u64,
    /// A_u before the update.
    pub previous_authority: f64,
    /// A_u after the update.
    pub authority_score: f64,
    /// B_u used in the blend.
    pub baseline_credential_score: f64,
    /// T_u(t-1), the value used in the blend.
    pub previous_track_record: f64,
    /// T_u(t), persisted for the next update.
    pub track_record_score: f64,
    /// P_u(t).
    pub peer_recognition_score: f64,
}

/// Computes and persists evaluator authority.
///
/// Holds an injected [`UserStore`]; concurrent updates to the same user are
/// serialized by the store's optimistic update.
///
/// # Example
///
/// ```rust
/// use rlcf_authority::{AuthorityCalculator, AuthorityWeights, TrackRecord};
/// use rlcf_store::{NewUser, Storage};
///
/// let storage = Storage::temporary().unwrap();
/// let user = storage.create_user(NewUser::new("ada")).unwrap();
///
/// let calculator = AuthorityCalculator::new(
///     &storage,
///     AuthorityWeights::new(0.3, 0.5, 0.2).unwrap(),
///     TrackRecord::new(0.05).unwrap(),
/// );
/// let updated = calculator.update_authority(user.id, 0.9, 1.0).unwrap();
/// assert!((updated.authority_score - 0.2).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct AuthorityCalculator<S> {
    store: S,
    weights: AuthorityWeights,
    track_record: TrackRecord,
}

impl<S: UserStore> AuthorityCalculator<S> {
    /// Creates a calculator over `store`.
    pub fn new(store: S, weights: AuthorityWeights, track_record: TrackRecord) -> Self {
        Self {
            store,
            weights,
            track_record,
        }
    }

    /// Returns the blend coefficients.
    pub fn weights(&self) -> AuthorityWeights {
        self.weights
    }

    /// Returns a user's authority.
    ///
    /// Without `level` or `domain` this is the cached A_u. With either set,
    /// A_u is recomputed from a baseline restricted to matching credentials
    /// and the stored T_u and P_u; nothing is persisted.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub fn get_authority(
        &self,
        user_id: u64,
        level: Option<CredentialLevel>,
        domain: Option<&str>,
    ) -> Result<f64> {
        let user = self.load(user_id)?;
        let filter = CredentialFilter {
            level,
            domain: domain.map(str::to_owned),
        };

        if filter.is_unrestricted() {
            return Ok(user.authority_score.clamp(0.0, 1.0));
        }

        let baseline = credential_baseline(&user.credentials, &filter);
        let authority = self.weights.blend(
            baseline,
            user.track_record_score,
            user.peer_recognition_score,
        );
        debug!(user_id, baseline, authority, "scoped authority computed");
        Ok(authority)
    }

    /// Records one evaluated contribution and recomputes authority.
    ///
    /// The new authority blends the track record *before* this contribution;
    /// the updated track record is persisted for the next call.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Evaluator to update
    /// * `feedback_quality` - Quality of the contribution, in `[0, 1]`
    /// * `peer_agreement` - Share of peer weight agreeing with it, in `[0, 1]`
    ///
    /// # Returns
    ///
    /// The components used in the blend, before and after values included.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if either input is outside `[0, 1]` or not finite
    /// - `NotFound` if the user does not exist
    #[instrument(skip(self))]
    pub fn update_authority(
        &self,
        user_id: u64,
        feedback_quality: f64,
        peer_agreement: f64,
    ) -> Result<UpdatedAuthority> {
        check_input("feedback_quality", feedback_quality)?;
        check_input("peer_agreement", peer_agreement)?;

        let mut outcome = None;
        self.store
            .update_user(user_id, |user| {
                let baseline = credential_baseline(&user.credentials, &CredentialFilter::any());
                let previous_track_record = user.track_record_score;
                let authority = self
                    .weights
                    .blend(baseline, previous_track_record, peer_agreement);
                let track_record = self.track_record.next(previous_track_record, feedback_quality);

                let mut next = user.clone();
                next.baseline_credential_score = baseline;
                next.track_record_score = track_record;
                next.peer_recognition_score = peer_agreement;
                next.authority_score = authority;

                outcome = Some(UpdatedAuthority {
                    user_id,
                    previous_authority: user.authority_score,
                    authority_score: authority,
                    baseline_credential_score: baseline,
                    previous_track_record,
                    track_record_score: track_record,
                    peer_recognition_score: peer_agreement,
                });
                Ok(next)
            })?
            .ok_or(AuthorityError::NotFound(user_id))?;

        let updated = outcome.ok_or(AuthorityError::NotFound(user_id))?;
        info!(
            user_id,
            previous = updated.previous_authority,
            authority = updated.authority_score,
            track_record = updated.track_record_score,
            "authority updated"
        );
        Ok(updated)
    }

    /// Refreshes the cached baseline after credentials change.
    ///
    /// A_u is re-blended from the new baseline and the stored T_u and P_u;
    /// the track record itself is untouched.
    #[instrument(skip(self))]
    pub fn recompute_baseline(&self, user_id: u64) -> Result<UpdatedAuthority> {
        let mut outcome = None;
        self.store
            .update_user(user_id, |user| {
                let baseline = credential_baseline(&user.credentials, &CredentialFilter::any());
                let authority = self.weights.blend(
                    baseline,
                    user.track_record_score,
                    user.peer_recognition_score,
                );

                let mut next = user.clone();
                next.baseline_credential_score = baseline;
                next.authority_score = authority;

                outcome = Some(UpdatedAuthority {
                    user_id,
                    previous_authority: user.authority_score,
                    authority_score: authority,
                    baseline_credential_score: baseline,
                    previous_track_record: user.track_record_score,
                    track_record_score: user.track_record_score,
                    peer_recognition_score: user.peer_recognition_score,
                });
                Ok(next)
            })?
            .ok_or(AuthorityError::NotFound(user_id))?;

        let updated = outcome.ok_or(AuthorityError::NotFound(user_id))?;
        debug!(user_id, baseline = updated.baseline_credential_score, "baseline refreshed");
        Ok(updated)
    }

    fn load(&self, user_id: u64) -> Result<User> {
        self.store
            .get_user(user_id)?
            .ok_or(AuthorityError::NotFound(user_id))
    }
}

fn check_input(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AuthorityError::InvalidArgument(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
