//! Track record T_u.
//!
//! An exponentially weighted moving average of feedback quality:
//!
//! ```text
//! T_u(t) = (1 - λ) · T_u(t-1) + λ · quality
//! ```
//!
//! With both inputs in `[0, 1]` the result stays in `[0, 1]`, and it is
//! monotone in `quality`: better feedback never lowers the record relative
//! to worse feedback from the same starting point.

use crate::error::{AuthorityError, Result};

/// EWMA track record updater.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackRecord {
    update_factor: f64,
}

impl TrackRecord {
    /// Creates an updater with smoothing factor λ.
    ///
    /// # Errors
    ///
    /// `InvalidCoefficients` unless `0 < λ <= 1`.
    pub fn new(update_factor: f64) -> Result<Self> {
        if !(update_factor > 0.0 && update_factor <= 1.0) {
            return Err(AuthorityError::InvalidCoefficients(format!(
                "track record update factor must be in (0, 1], got {}",
                update_factor
            )));
        }
        Ok(Self { update_factor })
    }

    /// Returns λ.
    pub fn update_factor(&self) -> f64 {
        self.update_factor
    }

    /// Folds one quality observation into the previous record.
    pub fn next(&self, previous: f64, quality: f64) -> f64 {
        let lambda = self.update_factor;
        ((1.0 - lambda) * previous + lambda * quality).clamp(0.0, 1.0)
    }
}
