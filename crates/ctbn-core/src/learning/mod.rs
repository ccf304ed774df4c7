//! EM clustering: statistics, aggregation, estimation and the driver.

pub mod aggregate;
pub mod clustering;
pub mod estimate;
pub mod extract;
pub mod init;
pub mod statistics;
pub mod stop;

pub use aggregate::{
    aggregator_for, reindex_for_assumed_class, Aggregator, HardAggregator, SoftAggregator,
    EXTRACTION_CLASS_STATE,
};
pub use clustering::{ClusteringLearner, LearningOutcome};
pub use estimate::{estimate_parameters, install_parameters};
pub use extract::{extract_all, extract_trajectory_statistics};
pub use init::{random_assignment, soft_sampling};
pub use statistics::{OccurrenceStatistics, SufficientStatistics, TransitionStatistics};
pub use stop::{StandardStopCriterion, StopCriterion, StopReason};
