//! Baseline credential score B_u.
//!
//! B_u is the weighted mean of a user's credential values:
//!
//! ```text
//! B_u = Σ weightᵢ · valueᵢ / Σ weightᵢ
//! ```
//!
//! A user with no matching credentials, or whose matching credentials all
//! carry zero weight, has a baseline of 0.0.

use rlcf_store::{Credential, CredentialLevel};

/// Restricts which credentials count toward a baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialFilter {
    /// Only credentials at or above this level count.
    pub level: Option<CredentialLevel>,
    /// Only general credentials and those for this domain count.
    pub domain: Option<String>,
}

impl CredentialFilter {
    /// A filter that accepts every credential.
    pub fn any() -> Self {
        Self::default()
    }

    /// Returns true when neither level nor domain is set.
    pub fn is_unrestricted(&self) -> bool {
        self.level.is_none() && self.domain.is_none()
    }

    /// Returns true if `credential` passes the filter.
    ///
    /// Credentials without a domain are general and match every domain.
    pub fn matches(&self, credential: &Credential) -> bool {
        let level_ok = self.level.map_or(true, |min| credential.level >= min);
        let domain_ok = match (&self.domain, &credential.domain) {
            (None, _) | (Some(_), None) => true,
            (Some(wanted), Some(own)) => wanted.eq_ignore_ascii_case(own),
        };
        level_ok && domain_ok
    }
}

/// Computes the baseline score over credentials passing `filter`.
pub fn credential_baseline(credentials: &[Credential], filter: &CredentialFilter) -> f64 {
    let (weighted, total) = credentials
        .iter()
        .filter(|c| filter.matches(c))
        .fold((0.0, 0.0), |(weighted, total), c| {
            (weighted + c.weight * c.value, total + c.weight)
        });

    if total <= 0.0 {
        0.0
    } else {
        (weighted / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_no_credentials() {
        assert_eq!(credential_baseline(&[], &CredentialFilter::any()), 0.0);
    }

    #[test]
    fn test_weighted_mean() {
        let credentials = vec![
            Credential::new("ACADEMIC_DEGREE", 0.9, 1.0),
            Credential::new("PROFESSIONAL_EXPERIENCE", 0.6, 2.0),
        ];
        let baseline = credential_baseline(&credentials, &CredentialFilter::any());
        assert!((baseline - 0.7).abs() < EPS);
    }

    #[test]
    fn test_zero_total_weight() {
        let credentials = vec![Credential::new("ACADEMIC_DEGREE", 0.9, 0.0)];
        assert_eq!(credential_baseline(&credentials, &CredentialFilter::any()), 0.0);
    }

    #[test]
    fn test_domain_filter_keeps_general_credentials() {
        let credentials = vec![
            Credential::new("DEGREE", 0.4, 1.0),
            Credential::new("BAR_ADMISSION", 1.0, 1.0).with_domain("tax"),
            Credential::new("BAR_ADMISSION", 0.0, 1.0).with_domain("criminal"),
        ];
        let filter = CredentialFilter {
            level: None,
            domain: Some("Tax".to_string()),
        };
        assert!((credential_baseline(&credentials, &filter) - 0.7).abs() < EPS);
    }

    #[test]
    fn test_level_filter() {
        let credentials = vec![
            Credential::new("DEGREE", 0.2, 1.0),
            Credential::new("JUDGESHIP", 1.0, 1.0).with_level(CredentialLevel::Expert),
        ];
        let filter = CredentialFilter {
            level: Some(CredentialLevel::Professional),
            domain: None,
        };
        assert!((credential_baseline(&credentials, &filter) - 1.0).abs() < EPS);
        assert!(!filter.is_unrestricted());
        assert!(CredentialFilter::any().is_unrestricted());
    }
}
