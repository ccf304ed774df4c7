//! CTBN clustering common types and errors.
//!
//! This crate provides the foundational error type shared by the
//! configuration crate and the learning engine:
//! - Stable error codes and categories
//! - Structured (JSON) and human-readable error rendering

pub mod error;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction};
