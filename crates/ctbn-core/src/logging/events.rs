//! Structured event vocabulary.
//!
//! Every learning event carries the run id and the stage it belongs to so
//! JSONL output can be grouped per run and filtered per stage.

use serde::{Deserialize, Serialize};

/// Stages of a learning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Precondition checks and configuration.
    Init,
    /// Per-trajectory statistics extraction.
    Extract,
    /// Statistics aggregation under the current assignment.
    Aggregate,
    /// Parameter estimation.
    Estimate,
    /// Reclassification of the training set.
    Classify,
    /// Stop decision and result assembly.
    Converge,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Extract => "extract",
            Stage::Aggregate => "aggregate",
            Stage::Estimate => "estimate",
            Stage::Classify => "classify",
            Stage::Converge => "converge",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const LEARN_STARTED: &str = "learn.started";
    pub const LEARN_CONVERGED: &str = "learn.converged";
    pub const LEARN_FAILED: &str = "learn.failed";

    pub const EXTRACT_FINISHED: &str = "extract.finished";
    pub const SEED_ASSIGNED: &str = "init.seed_assigned";
    pub const ESTIMATE_FINISHED: &str = "estimate.finished";
    pub const CLASSIFY_FINISHED: &str = "classify.finished";
    pub const ITERATION_FINISHED: &str = "iteration.finished";

    // Binary
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const SAMPLE_FINISHED: &str = "sample.finished";
}

/// Correlation data attached to every event of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }
}
