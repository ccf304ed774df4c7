//! Classification collaborators.
//!
//! The clustering driver only needs [`Classifier`]; [`ExactClassifier`]
//! is the complete-data posterior used by default.

pub mod classifier;
pub mod exact;

pub use classifier::{ClassificationResult, Classifier};
pub use exact::{ExactClassifier, MapClassifier};
