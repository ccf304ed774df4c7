//! Learning configuration types.
//!
//! The pseudo-counts added to sufficient statistics, the clustering mode,
//! and the stop criterion bounds. All of them are fixed for one learning run.

use crate::validate::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};

/// Bayesian pseudo-counts and clustering mode for one learning run.
///
/// `mxx_prior` is added to every off-diagonal transition count, `tx_prior`
/// to every holding time, and `px_prior` to every static occurrence count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningPriors {
    pub mxx_prior: f64,
    pub tx_prior: f64,
    pub px_prior: f64,

    /// Hard assignment (one label per trajectory) instead of
    /// posterior-weighted soft assignment.
    #[serde(default)]
    pub hard_clustering: bool,
}

impl Default for LearningPriors {
    fn default() -> Self {
        Self {
            mxx_prior: 1.0,
            tx_prior: 0.005,
            px_prior: 1.0,
            hard_clustering: false,
        }
    }
}

impl LearningPriors {
    /// Priors with the given pseudo-counts and clustering mode.
    pub fn new(mxx_prior: f64, tx_prior: f64, px_prior: f64, hard_clustering: bool) -> Self {
        Self {
            mxx_prior,
            tx_prior,
            px_prior,
            hard_clustering,
        }
    }

    /// Priors that add nothing (maximum-likelihood estimates).
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, false)
    }

    /// Same pseudo-counts, hard clustering.
    pub fn hard(mut self) -> Self {
        self.hard_clustering = true;
        self
    }

    /// Same pseudo-counts, soft clustering.
    pub fn soft(mut self) -> Self {
        self.hard_clustering = false;
        self
    }
}

/// Bounds for the standard stop criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopCriterionConfig {
    /// Stop once the iteration counter exceeds this value. Must be >= 2.
    pub max_iteration: usize,
    /// Stop once the fraction of relabelled trajectories is at most this. In [0, 1].
    pub changed_bound: f64,
}

impl Default for StopCriterionConfig {
    fn default() -> Self {
        Self {
            max_iteration: 100,
            changed_bound: 0.1,
        }
    }
}

/// Complete clustering configuration as loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    pub priors: LearningPriors,

    #[serde(default)]
    pub stop: StopCriterionConfig,

    /// Seed for the initial random assignment; absent means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            priors: LearningPriors::default(),
            stop: StopCriterionConfig::default(),
            seed: None,
        }
    }
}

impl ClusteringConfig {
    /// Read and parse a configuration file. Semantic checks are left to
    /// [`crate::validate::validate_config`].
    pub fn from_file(path: &std::path::Path) -> ValidationResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ValidationError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}
