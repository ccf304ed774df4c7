//! Failure taxonomy shared by every ctbn crate.
//!
//! Each [`Error`] variant maps to one row of metadata: a numeric code that
//! never changes between releases, a category, the action a caller should
//! take and two short strings for terminals. Codes are banded by category:
//!
//! | band  | category       |
//! |-------|----------------|
//! | 10-19 | `config`       |
//! | 20-29 | `precondition` |
//! | 30-39 | `data`         |
//! | 40-49 | `numerical`    |
//! | 50-59 | `io`           |
//!
//! Errors raised while processing trajectory `i` are wrapped in
//! [`Error::InTrajectory`]; the wrapper is transparent to every accessor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Precondition,
    /// Trajectory content contradicting the model.
    Data,
    Numerical,
    Io,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Precondition => "precondition",
            Self::Data => "data",
            Self::Numerical => "numerical",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller is expected to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Retry,
    ResetConfig,
    /// Rerun with larger pseudo-counts.
    AdjustPriors,
    /// Repair or drop the offending trajectories.
    FixData,
    Abort,
    ManualIntervention,
}

impl SuggestedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::ResetConfig => "reset_config",
            Self::AdjustPriors => "adjust_priors",
            Self::FixData => "fix_data",
            Self::Abort => "abort",
            Self::ManualIntervention => "manual_intervention",
        }
    }
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid priors: {0}")]
    InvalidPriors(String),

    #[error("invalid stop criterion: {0}")]
    InvalidStopCriterion(String),

    /// The classifier cannot do what the requested clustering mode needs.
    #[error("capability not available: {0}")]
    MissingCapability(String),

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("class node '{node}' must not have parents (found {parents})")]
    ClassNodeHasParents { node: String, parents: usize },

    #[error("class index {index} is out of range for a model with {node_count} nodes")]
    ClassIndexOutOfRange { index: usize, node_count: usize },

    #[error("malformed trajectory: {0}")]
    MalformedTrajectory(String),

    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    #[error("static node '{node}' changed state at event {event}")]
    StaticNodeChanged { node: String, event: usize },

    #[error("trajectory {index}: {source}")]
    InTrajectory {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// A conditional table came out with a zero row, a zero holding time
    /// or a non-finite entry.
    #[error("degenerate parameters for node '{node}' at parent configuration {parent_configuration}: {reason}")]
    DegenerateParameters {
        node: String,
        parent_configuration: usize,
        reason: String,
    },

    #[error("degenerate likelihood: {0}")]
    DegenerateLikelihood(String),

    #[error("classification failed: {0}")]
    Inference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Static facts about one error kind.
#[derive(Debug, Clone, Copy)]
struct Meta {
    code: u32,
    category: ErrorCategory,
    action: SuggestedAction,
    headline: &'static str,
    hint: &'static str,
}

const fn meta(
    code: u32,
    category: ErrorCategory,
    action: SuggestedAction,
    headline: &'static str,
    hint: &'static str,
) -> Meta {
    Meta {
        code,
        category,
        action,
        headline,
        hint,
    }
}

impl Error {
    /// Wrap with the index of the trajectory being processed. An error that
    /// already carries an index keeps it.
    pub fn in_trajectory(self, index: usize) -> Self {
        match self {
            wrapped @ Error::InTrajectory { .. } => wrapped,
            inner => Error::InTrajectory {
                index,
                source: Box::new(inner),
            },
        }
    }

    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::InTrajectory { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Index of the trajectory this error was raised for, if any.
    pub fn trajectory_index(&self) -> Option<usize> {
        match self {
            Error::InTrajectory { index, .. } => Some(*index),
            _ => None,
        }
    }

    fn meta(&self) -> Meta {
        use ErrorCategory as C;
        use SuggestedAction as A;
        match self {
            Error::InTrajectory { source, .. } => source.meta(),
            Error::Config(_) => meta(10, C::Config, A::ResetConfig, "Configuration Error",
                "Compare the clustering file with the documented schema."),
            Error::InvalidPriors(_) => meta(11, C::Config, A::ResetConfig, "Invalid Priors",
                "Mxx, Tx and Px pseudo-counts must be finite and at least zero."),
            Error::InvalidStopCriterion(_) => meta(12, C::Config, A::ResetConfig, "Invalid Stop Criterion",
                "Allow at least 2 iterations and keep the changed bound within [0, 1]."),
            Error::MissingCapability(_) => meta(13, C::Config, A::ManualIntervention, "Missing Capability",
                "Soft clustering needs posteriors; pick a classifier that reports them or cluster hard."),
            Error::EmptyTrainingSet => meta(20, C::Precondition, A::FixData, "Empty Training Set",
                "Pass at least one trajectory."),
            Error::ClassNodeHasParents { .. } => meta(21, C::Precondition, A::ManualIntervention, "Class Node Has Parents",
                "Drop every edge pointing into the class node."),
            Error::ClassIndexOutOfRange { .. } => meta(22, C::Precondition, A::ManualIntervention, "Class Index Out Of Range",
                "The class index must name one of the model's nodes."),
            Error::MalformedTrajectory(_) => meta(23, C::Precondition, A::FixData, "Malformed Trajectory",
                "Start at time 0, keep times strictly increasing and give every node a valid state."),
            Error::InvalidStructure(_) => meta(24, C::Precondition, A::ManualIntervention, "Invalid Structure",
                "Use a square adjacency matrix sized to the node count with an empty diagonal."),
            Error::StaticNodeChanged { .. } => meta(30, C::Data, A::FixData, "Static Node Changed",
                "A static variable holds one value per trajectory; repair or remove this one."),
            Error::DegenerateParameters { .. } => meta(40, C::Numerical, A::AdjustPriors, "Degenerate Parameters",
                "Raise the Tx/Mxx/Px priors or add trajectories that reach every state."),
            Error::DegenerateLikelihood(_) => meta(41, C::Numerical, A::AdjustPriors, "Degenerate Likelihood",
                "Every class gives the trajectory zero likelihood; raise the priors."),
            Error::Inference(_) => meta(42, C::Numerical, A::Abort, "Classification Error",
                "The classifier failed on this trajectory; report it with the input."),
            Error::Io(_) => meta(50, C::Io, A::Retry, "I/O Error",
                "Make sure the path exists and is readable, then retry."),
            Error::Json(_) => meta(51, C::Io, A::ManualIntervention, "JSON Parse Error",
                "The file is not valid JSON; `jq .` points at the problem."),
        }
    }

    /// Stable numeric code, banded by category.
    pub fn code(&self) -> u32 {
        self.meta().code
    }

    pub fn category(&self) -> ErrorCategory {
        self.meta().category
    }

    /// Only transient I/O failures are worth retrying unchanged. Learning
    /// failures abort the current call.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.root(), Error::Io(_))
    }

    pub fn suggested_action(&self) -> SuggestedAction {
        self.meta().action
    }

    pub fn headline(&self) -> &'static str {
        self.meta().headline
    }

    pub fn remediation(&self) -> &'static str {
        self.meta().hint
    }
}

/// Machine-readable rendering of an [`Error`], one JSON object per failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    pub recoverable: bool,
    pub suggested_action: SuggestedAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_configuration: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<usize>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut out = StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            trajectory: err.trajectory_index(),
            node: None,
            parent_configuration: None,
            event: None,
        };
        match err.root() {
            Error::DegenerateParameters {
                node,
                parent_configuration,
                ..
            } => {
                out.node = Some(node.clone());
                out.parent_configuration = Some(*parent_configuration);
            }
            Error::StaticNodeChanged { node, event } => {
                out.node = Some(node.clone());
                out.event = Some(*event);
            }
            Error::ClassNodeHasParents { node, .. } => out.node = Some(node.clone()),
            _ => {}
        }
        out
    }
}

impl StructuredError {
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(_) => serde_json::json!({ "code": self.code, "message": self.message }).to_string(),
        }
    }
}

/// Three-line stderr rendering: headline, message, hint.
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let paint = |code: &str, text: &str| {
        if use_color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    };
    let mut lines = vec![
        format!("{} {} [{}]", paint("31", "error:"), err.headline(), err.code()),
        format!("  {}", err),
        format!("  {} {}", paint("36", "hint:"), err.remediation()),
    ];
    if let Some(index) = err.trajectory_index() {
        lines.push(format!("  trajectory: #{}", index));
    }
    lines.join("\n")
}
