//! CTBN Clustering Core Library
//!
//! Learns the parameters of a continuous-time Bayesian network classifier
//! together with a partition of unlabeled trajectories into classes:
//! - Model, node and trajectory types with pure parent-configuration indexing
//! - Per-trajectory sufficient statistics extraction
//! - Hard and soft (posterior-weighted) statistics aggregation
//! - Parameter estimation with validity checks
//! - The EM clustering driver and its stop criterion
//! - An exact classifier and a trajectory sampler
//!
//! The binary entry point is in `main.rs`.

pub mod benchmark;
pub mod exit_codes;
pub mod inference;
pub mod learning;
pub mod logging;
pub mod model;
pub mod sampling;

pub use ctbn_common::{Error, Result};
pub use ctbn_config::{ClusteringConfig, LearningPriors, StopCriterionConfig};
pub use inference::{ClassificationResult, Classifier, ExactClassifier, MapClassifier};
pub use learning::{
    ClusteringLearner, HardAggregator, LearningOutcome, SoftAggregator, StandardStopCriterion,
    StopCriterion, StopReason, SufficientStatistics,
};
pub use model::{CtbnModel, Event, IntensityMatrix, Node, NodeKind, NodeParameters, Trajectory};
pub use sampling::TrajectorySampler;
