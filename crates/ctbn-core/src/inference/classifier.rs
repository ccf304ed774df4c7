//! The classification collaborator used by the clustering driver.

use crate::model::{CtbnModel, Trajectory};
use ctbn_common::Result;
use serde::{Deserialize, Serialize};

/// Class assignment of one trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Most probable class state.
    pub label: usize,
    /// Posterior over class states, when the classifier computes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posterior: Option<Vec<f64>>,
    /// Log marginal likelihood of the trajectory under the current model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_likelihood: Option<f64>,
}

impl ClassificationResult {
    /// A label without probabilities.
    pub fn hard(label: usize) -> Self {
        Self {
            label,
            posterior: None,
            log_likelihood: None,
        }
    }

    /// A posterior; the label is its first maximum.
    pub fn from_posterior(posterior: Vec<f64>, log_likelihood: Option<f64>) -> Self {
        let label = ctbn_math::argmax(&posterior).unwrap_or(0);
        Self {
            label,
            posterior: Some(posterior),
            log_likelihood,
        }
    }

    /// Probability of `class`, falling back to the one-hot label.
    pub fn probability(&self, class: usize) -> f64 {
        match &self.posterior {
            Some(p) => p.get(class).copied().unwrap_or(0.0),
            None if class == self.label => 1.0,
            None => 0.0,
        }
    }
}

/// Assigns trajectories to class states under the model's current parameters.
///
/// Implementations are shared across worker threads while a learning run
/// classifies the training set.
pub trait Classifier: Send + Sync {
    fn classify(&self, model: &CtbnModel, trajectory: &Trajectory) -> Result<ClassificationResult>;

    /// Whether [`Classifier::classify`] fills in the posterior.
    fn supports_probabilities(&self) -> bool;

    fn name(&self) -> &str {
        "classifier"
    }
}
