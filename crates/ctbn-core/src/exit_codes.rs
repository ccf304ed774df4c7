//! Process exit statuses of `ctbn-cluster`.
//!
//! `0` is success, `10..20` means the input was wrong (flags, config file,
//! training data, or a model that cannot be fitted), `20..30` means the
//! tool itself or the filesystem failed.

use ctbn_common::{Error, ErrorCategory};

/// Stable across releases; scripts match on the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Clean = 0,

    /// Rejected by the argument parser or out-of-range flag values.
    ArgsError = 10,

    /// Priors, stop bounds or classifier capability.
    ConfigError = 11,

    /// Empty training set or a structure the learner cannot use.
    PreconditionError = 12,

    /// A trajectory contradicts the model.
    DataError = 13,

    /// Parameters or likelihoods collapsed to zero or non-finite values.
    NumericalError = 14,

    /// A classifier failure; always a bug.
    InternalError = 20,

    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Symbolic name printed next to the number in JSON summaries.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::PreconditionError => "ERR_PRECONDITION",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::NumericalError => "ERR_NUMERICAL",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Status for a failed learning run. Classifier failures are internal;
    /// everything else follows the error category.
    pub fn from_error(err: &Error) -> Self {
        match err.root() {
            Error::Inference(_) => ExitCode::InternalError,
            other => match other.category() {
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Precondition => ExitCode::PreconditionError,
                ErrorCategory::Data => ExitCode::DataError,
                ErrorCategory::Numerical => ExitCode::NumericalError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
