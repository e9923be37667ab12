//! Configuration types for the RLCF engine.
//!
//! Every tunable lives here, loaded from TOML. Algorithm code never falls
//! back to a default of its own; it receives each parameter from this
//! struct.

use std::path::{Path, PathBuf};

use rlcf_authority::{AuthorityWeights, TrackRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlcfConfig {
    /// Aggregation gate and output limits.
    pub aggregation: AggregationConfig,

    /// Authority blend coefficients.
    pub authority: AuthorityConfig,

    /// Field-level diagnostics.
    pub analysis: AnalysisConfig,

    /// Storage location.
    pub storage: StorageConfig,
}

/// Aggregation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// δ above this selects the uncertainty-preserving output.
    pub disagreement_threshold: f64,

    /// Supporter names listed per alternative position.
    pub max_listed_supporters: usize,

    /// Research suggestions derived from contention points.
    pub max_research_suggestions: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            disagreement_threshold: 0.4,
            max_listed_supporters: 3,
            max_research_suggestions: 3,
        }
    }
}

/// Authority model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Weight of the credential baseline.
    pub alpha: f64,

    /// Weight of the track record.
    pub beta: f64,

    /// Weight of peer recognition.
    pub gamma: f64,

    /// EWMA factor λ of the track record.
    pub track_record_update_factor: f64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 0.5,
            gamma: 0.2,
            track_record_update_factor: 0.05,
        }
    }
}

/// Consensus analyzer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Base-2 field entropy above which a field is a contention point.
    pub contention_entropy_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            contention_entropy_threshold: 0.5,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the sled database.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./rlcf.db"),
        }
    }
}

impl RlcfConfig {
    /// Parses and validates a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RlcfConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every value for range and consistency.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.aggregation.disagreement_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "aggregation.disagreement_threshold must be in [0, 1], got {}",
                threshold
            )));
        }
        if self.aggregation.max_listed_supporters == 0 {
            return Err(ConfigError::Invalid(
                "aggregation.max_listed_supporters must be at least 1".to_string(),
            ));
        }

        let contention = self.analysis.contention_entropy_threshold;
        if !contention.is_finite() || contention < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "analysis.contention_entropy_threshold must be a non-negative number, got {}",
                contention
            )));
        }

        self.authority_weights()?;
        self.track_record()?;
        Ok(())
    }

    /// Blend coefficients from `[authority]`.
    pub fn authority_weights(&self) -> Result<AuthorityWeights, ConfigError> {
        AuthorityWeights::new(self.authority.alpha, self.authority.beta, self.authority.gamma)
            .map_err(|e| ConfigError::Invalid(format!("authority: {}", e)))
    }

    /// Track record model from `[authority]`.
    pub fn track_record(&self) -> Result<TrackRecord, ConfigError> {
        TrackRecord::new(self.authority.track_record_update_factor)
            .map_err(|e| ConfigError::Invalid(format!("authority: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RlcfConfig::default();
        assert!((config.aggregation.disagreement_threshold - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.aggregation.max_listed_supporters, 3);
        assert!((config.authority.alpha - 0.3).abs() < f64::EPSILON);
        assert!((config.analysis.contention_entropy_threshold - 0.5).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = RlcfConfig::from_toml_str(
            r#"
            [aggregation]
            disagreement_threshold = 0.25
            "#,
        )
        .unwrap();
        assert!((config.aggregation.disagreement_threshold - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.aggregation.max_research_suggestions, 3);
        assert_eq!(config.authority, AuthorityConfig::default());
    }

    #[test]
    fn test_full_toml() {
        let config = RlcfConfig::from_toml_str(
            r#"
            [aggregation]
            disagreement_threshold = 0.5
            max_listed_supporters = 5
            max_research_suggestions = 1

            [authority]
            alpha = 0.2
            beta = 0.6
            gamma = 0.2
            track_record_update_factor = 0.1

            [analysis]
            contention_entropy_threshold = 0.8

            [storage]
            db_path = "/var/lib/rlcf"
            "#,
        )
        .unwrap();
        assert_eq!(config.aggregation.max_listed_supporters, 5);
        assert!((config.authority.beta - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.storage.db_path, PathBuf::from("/var/lib/rlcf"));
    }

    #[test]
    fn test_coefficients_must_sum_to_one() {
        let err = RlcfConfig::from_toml_str(
            r#"
            [authority]
            alpha = 0.5
            beta = 0.5
            gamma = 0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = RlcfConfig::default();
        config.aggregation.disagreement_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.aggregation.disagreement_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_update_factor() {
        let mut config = RlcfConfig::default();
        config.authority.track_record_update_factor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = RlcfConfig::from_toml_str("[aggregation\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RlcfConfig::from_file("/nonexistent/rlcf.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rlcf.toml");
        std::fs::write(&path, "[analysis]\ncontention_entropy_threshold = 0.9\n").unwrap();
        let config = RlcfConfig::from_file(&path).unwrap();
        assert!((config.analysis.contention_entropy_threshold - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RlcfConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(RlcfConfig::from_toml_str(&text).unwrap(), config);
    }
}
