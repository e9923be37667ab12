//! Error types for authority scoring.

use rlcf_store::StoreError;
use thiserror::Error;

/// Result type alias for authority operations.
pub type Result<T> = std::result::Result<T, AuthorityError>;

/// Errors that can occur while reading or updating authority.
///
/// Inputs are rejected before any state is touched; an error never leaves a
/// half-applied update behind.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The user does not exist.
    #[error("user {0} not found")]
    NotFound(u64),

    /// An update input was out of range or not a number.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Blend coefficients or the track record factor are unusable.
    #[error("invalid authority coefficients: {0}")]
    InvalidCoefficients(String),

    /// Store failure passthrough.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
