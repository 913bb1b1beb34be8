//! Unified error types for the HSS ecosystem
//!
//! This module provides a common error type [`HssError`] that can represent
//! errors from any part of the study pipeline. Domain-specific error types
//! are converted to `HssError` for uniform handling at API boundaries.
//!
//! Recoverable conditions (a non-convergent case, a skipped contingency, an
//! unparsable export) are *not* errors here; they are statuses and
//! diagnostics. Only the small set of truly fatal conditions (no usable
//! base case, no usable export, an invariant violation) should surface as
//! an `HssError` to the top-level caller.

use thiserror::Error;

/// Unified error type for all HSS operations.
#[derive(Error, Debug)]
pub enum HssError {
    /// I/O errors (file access, export reading, manifest writing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Study configuration errors (duplicate names, malformed rows)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors reported by the external solver engine boundary
    #[error("Engine error: {0}")]
    Engine(String),

    /// Result aggregation errors (residual duplicate keys, zero exports)
    #[error("Aggregation error: {0}")]
    Aggregate(String),

    /// Boundary/locus geometry errors
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Unrecoverable run-level failures (nothing downstream is possible)
    #[error("Fatal: {0}")]
    Fatal(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using HssError.
pub type HssResult<T> = Result<T, HssError>;

impl HssError {
    /// True when the error must terminate the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HssError::Fatal(_))
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for HssError {
    fn from(err: anyhow::Error) -> Self {
        HssError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for HssError {
    fn from(s: String) -> Self {
        HssError::Other(s)
    }
}

impl From<&str> for HssError {
    fn from(s: &str) -> Self {
        HssError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for HssError {
    fn from(err: serde_json::Error) -> Self {
        HssError::Parse(err.to_string())
    }
}
