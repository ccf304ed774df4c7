//! CTBN clustering configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the learning priors and stop criterion
//! - JSON loading of a complete clustering configuration
//! - Semantic validation with stable error codes

pub mod priors;
pub mod validate;

pub use priors::{ClusteringConfig, LearningPriors, StopCriterionConfig};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
