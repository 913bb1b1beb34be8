//! # hss-core: Harmonic Study Suite foundations
//!
//! Shared infrastructure for the study pipeline: the unified error type,
//! the diagnostics collection used to report per-item findings once per
//! stage, the retry combinator for transient engine failures, and the typed
//! settings groups constructed from the parsed study document.
//!
//! Domain logic lives in the stage crates (`hss-study`, `hss-engine`,
//! `hss-results`, `hss-geom`); this crate stays free of any model of the
//! network itself.

pub mod diagnostics;
pub mod error;
pub mod retry;
pub mod settings;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{HssError, HssResult};
pub use retry::{retry_with_backoff, retry_with_backoff_using, RetryPolicy};
pub use settings::{
    AggregateSettings, BoundarySettings, ScheduleSettings, SolverSettings, StudySettings,
};
