//! Semantic checks run after a configuration file parses.

use crate::priors::{ClusteringConfig, LearningPriors, StopCriterionConfig};
use thiserror::Error;

pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("not a clustering configuration: {0}")]
    Malformed(String),

    #[error("schema {found} is not supported (expected {expected})")]
    SchemaVersion { expected: String, found: String },

    /// A single setting outside its admissible range.
    #[error("{field} = {value}: {requirement}")]
    OutOfRange {
        field: &'static str,
        value: String,
        requirement: &'static str,
    },
}

impl ValidationError {
    /// Stable code for the `config_error` exit path.
    pub fn code(&self) -> u32 {
        match self {
            Self::Unreadable { .. } => 60,
            Self::Malformed(_) => 61,
            Self::OutOfRange { .. } => 65,
            Self::SchemaVersion { .. } => 66,
        }
    }

    /// Dotted path of the rejected setting.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::OutOfRange { field, .. } => Some(*field),
            _ => None,
        }
    }

    /// True when the file itself could not be read.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }
}

fn out_of_range(field: &'static str, value: impl ToString, requirement: &'static str) -> ValidationError {
    ValidationError::OutOfRange {
        field,
        value: value.to_string(),
        requirement,
    }
}

pub fn validate_config(config: &ClusteringConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::SchemaVersion {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            found: config.schema_version.clone(),
        });
    }
    validate_priors(&config.priors)?;
    validate_stop_criterion(&config.stop)
}

/// Every pseudo-count must be a finite number `>= 0`.
pub fn validate_priors(priors: &LearningPriors) -> ValidationResult<()> {
    [
        ("priors.mxx_prior", priors.mxx_prior),
        ("priors.tx_prior", priors.tx_prior),
        ("priors.px_prior", priors.px_prior),
    ]
    .into_iter()
    .try_for_each(|(field, value)| pseudo_count(field, value))
}

/// `max_iteration` must exceed 1 and `changed_bound` must lie in `[0, 1]`.
pub fn validate_stop_criterion(stop: &StopCriterionConfig) -> ValidationResult<()> {
    if stop.max_iteration < 2 {
        return Err(out_of_range(
            "stop.max_iteration",
            stop.max_iteration,
            "at least 2 iterations are required",
        ));
    }
    // NaN fails the range test as well.
    if !(0.0..=1.0).contains(&stop.changed_bound) {
        return Err(out_of_range(
            "stop.changed_bound",
            stop.changed_bound,
            "must be a fraction in [0, 1]",
        ));
    }
    Ok(())
}

fn pseudo_count(field: &'static str, value: f64) -> ValidationResult<()> {
    match value {
        v if !v.is_finite() => Err(out_of_range(field, v, "must be finite")),
        v if v < 0.0 => Err(out_of_range(field, v, "must not be negative")),
        _ => Ok(()),
    }
}
