//! Stop criteria for the EM loop.

use ctbn_common::{Error, Result};
use ctbn_config::StopCriterionConfig;
use serde::{Deserialize, Serialize};

/// Why a learning run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Few enough trajectories changed label.
    ChangedBound,
    /// The iteration counter passed its maximum.
    IterationLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ChangedBound => write!(f, "changed_bound"),
            StopReason::IterationLimit => write!(f, "iteration_limit"),
        }
    }
}

/// Decides, after each classification pass, whether to stop.
pub trait StopCriterion: Send + Sync {
    /// `Some(reason)` to stop after `iteration` with `changed_fraction` of
    /// the trajectories relabelled.
    fn check(&self, iteration: usize, changed_fraction: f64) -> Option<StopReason>;

    fn should_stop(&self, iteration: usize, changed_fraction: f64) -> bool {
        self.check(iteration, changed_fraction).is_some()
    }
}

/// Stop when `iteration > max_iteration` or `changed_fraction <= changed_bound`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardStopCriterion {
    max_iteration: usize,
    changed_bound: f64,
}

impl StandardStopCriterion {
    /// Fails unless `max_iteration > 1` and `changed_bound` is in [0, 1].
    pub fn new(max_iteration: usize, changed_bound: f64) -> Result<Self> {
        if max_iteration <= 1 {
            return Err(Error::InvalidStopCriterion(format!(
                "max_iteration must be greater than 1, got {}",
                max_iteration
            )));
        }
        if !(0.0..=1.0).contains(&changed_bound) {
            return Err(Error::InvalidStopCriterion(format!(
                "changed_bound must be in [0, 1], got {}",
                changed_bound
            )));
        }
        Ok(Self {
            max_iteration,
            changed_bound,
        })
    }

    pub fn from_config(config: &StopCriterionConfig) -> Result<Self> {
        Self::new(config.max_iteration, config.changed_bound)
    }

    pub fn max_iteration(&self) -> usize {
        self.max_iteration
    }

    pub fn changed_bound(&self) -> f64 {
        self.changed_bound
    }
}

impl Default for StandardStopCriterion {
    fn default() -> Self {
        let config = StopCriterionConfig::default();
        Self {
            max_iteration: config.max_iteration,
            changed_bound: config.changed_bound,
        }
    }
}

impl StopCriterion for StandardStopCriterion {
    fn check(&self, iteration: usize, changed_fraction: f64) -> Option<StopReason> {
        if changed_fraction <= self.changed_bound {
            Some(StopReason::ChangedBound)
        } else if iteration > self.max_iteration {
            Some(StopReason::IterationLimit)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_bounds() {
        assert!(StandardStopCriterion::new(1, 0.1).is_err());
        assert!(StandardStopCriterion::new(0, 0.1).is_err());
        assert!(StandardStopCriterion::new(2, -0.01).is_err());
        assert!(StandardStopCriterion::new(2, 1.01).is_err());
        assert!(StandardStopCriterion::new(2, f64::NAN).is_err());
        assert!(StandardStopCriterion::new(2, 0.0).is_ok());
        assert!(StandardStopCriterion::new(2, 1.0).is_ok());
    }

    #[test]
    fn stops_past_the_limit() {
        let stop = StandardStopCriterion::new(5, 0.1).unwrap();
        assert_eq!(stop.check(6, 1.0), Some(StopReason::IterationLimit));
        assert_eq!(stop.check(5, 1.0), None);
    }

    #[test]
    fn stops_at_the_bound() {
        let stop = StandardStopCriterion::new(5, 0.1).unwrap();
        assert_eq!(stop.check(1, 0.1), Some(StopReason::ChangedBound));
        assert!(!stop.should_stop(1, 0.11));
        assert_eq!(stop.check(9, 0.0), Some(StopReason::ChangedBound));
    }
}
