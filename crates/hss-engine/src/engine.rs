//! The external solver/execution engine boundary.
//!
//! The engine owns the network model, the numerics and its own worker pool;
//! this crate only wraps policy around it. All engine status codes are
//! treated as an opaque enumeration classified here; nothing in the
//! pipeline interprets solver internals.
//!
//! The engine's active-case context is a single shared mutable resource.
//! [`ActiveCase`] scopes acquisition so deactivation happens on every exit
//! path, including failures.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use hss_study::{CaseVariant, ElementResolver};

/// Raw status code returned by the engine's feasibility primitive.
pub type StatusCode = i32;

/// Code meaning a feasible, convergent load flow.
pub const CODE_CONVERGENT: StatusCode = 0;

/// Codes meaning the load flow diverged (numerically unusable case).
pub const DIVERGENCE_CODES: [StatusCode; 2] = [1, 2];

/// Submission error codes worth retrying (license hiccup, call timeout).
pub const TRANSIENT_CODES: [StatusCode; 2] = [-11, -12];

/// Code the scheduler uses when a remote call exceeded its timeout.
pub const CODE_TIMEOUT: StatusCode = -12;

/// Classification of a feasibility status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeasibilityOutcome {
    Convergent,
    /// One of the known divergence codes.
    NonConvergent(StatusCode),
    /// Any other non-zero code; the raw code is kept for diagnostics.
    Skipped(StatusCode),
}

/// Classify an opaque feasibility code per the fixed code sets.
pub fn classify_feasibility(code: StatusCode) -> FeasibilityOutcome {
    if code == CODE_CONVERGENT {
        FeasibilityOutcome::Convergent
    } else if DIVERGENCE_CODES.contains(&code) {
        FeasibilityOutcome::NonConvergent(code)
    } else {
        FeasibilityOutcome::Skipped(code)
    }
}

/// An engine call that did not complete.
#[derive(Debug, Clone, Error)]
#[error("engine call failed with code {code}: {message}")]
pub struct EngineError {
    pub code: StatusCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::new(
            CODE_TIMEOUT,
            format!("call exceeded timeout after {:.1}s", elapsed.as_secs_f64()),
        )
    }

    /// Transient errors are retried; everything else escalates immediately.
    pub fn is_transient(&self) -> bool {
        TRANSIENT_CODES.contains(&self.code)
    }
}

/// Per-case outcome of one batch submission.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CaseScanRecord {
    pub case_id: String,
    /// Raw result export location, when the scan produced one.
    pub export: Option<PathBuf>,
    pub error: Option<String>,
}

/// Boundary contract with the external solver/execution engine.
///
/// Implementations adapt a concrete engine's API and codes onto the fixed
/// classification sets of this module. The engine, not the caller, provides
/// true parallelism inside `submit_batch`.
pub trait SolverEngine: Send + Sync {
    /// Make `case_id` the engine's active case context.
    fn activate(&self, case_id: &str) -> Result<(), EngineError>;

    /// Release the active case context.
    fn deactivate(&self, case_id: &str) -> Result<(), EngineError>;

    /// True when `element` resolves against the model `network_reference`
    /// points at.
    fn can_resolve(&self, network_reference: &str, element: &str) -> bool;

    /// Run the quick feasibility (load flow) primitive for the active case.
    fn run_feasibility(&self, variant: &CaseVariant) -> Result<StatusCode, EngineError>;

    /// Run the expensive frequency scan for one case, returning the raw
    /// export location.
    fn run_scan(&self, variant: &CaseVariant) -> Result<PathBuf, EngineError>;

    /// Submit a batch to the engine's bounded-concurrency execution
    /// facility. `Err` means the batch as a whole did not run; per-case
    /// failures inside a completed batch appear on the records.
    fn submit_batch(
        &self,
        variants: &[CaseVariant],
        parallel: bool,
        timeout: Duration,
    ) -> Result<Vec<CaseScanRecord>, EngineError>;
}

/// Adapter exposing an engine's element lookup as an expander resolver.
pub struct EngineResolver<'a>(pub &'a dyn SolverEngine);

impl ElementResolver for EngineResolver<'_> {
    fn can_resolve(&self, network_reference: &str, element: &str) -> bool {
        self.0.can_resolve(network_reference, element)
    }
}

/// Scoped acquisition of the engine's single active-case context.
///
/// Deactivates on drop, so early returns and `?` cannot leak an active
/// case. Deactivation failures during drop are logged, not raised.
pub struct ActiveCase<'a> {
    engine: &'a dyn SolverEngine,
    case_id: String,
    released: bool,
}

impl<'a> ActiveCase<'a> {
    pub fn acquire(engine: &'a dyn SolverEngine, case_id: &str) -> Result<Self, EngineError> {
        engine.activate(case_id)?;
        Ok(Self {
            engine,
            case_id: case_id.to_string(),
            released: false,
        })
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Explicit release that surfaces deactivation errors.
    pub fn release(mut self) -> Result<(), EngineError> {
        self.released = true;
        self.engine.deactivate(&self.case_id)
    }
}

impl Drop for ActiveCase<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.engine.deactivate(&self.case_id) {
                warn!(case = %self.case_id, "deactivation during drop failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn classification_covers_the_fixed_code_sets() {
        assert_eq!(classify_feasibility(0), FeasibilityOutcome::Convergent);
        assert_eq!(classify_feasibility(1), FeasibilityOutcome::NonConvergent(1));
        assert_eq!(classify_feasibility(2), FeasibilityOutcome::NonConvergent(2));
        assert_eq!(classify_feasibility(7), FeasibilityOutcome::Skipped(7));
        assert_eq!(classify_feasibility(-3), FeasibilityOutcome::Skipped(-3));
    }

    #[test]
    fn transient_codes_are_retryable() {
        assert!(EngineError::new(-11, "license busy").is_transient());
        assert!(EngineError::timeout(Duration::from_secs(100)).is_transient());
        assert!(!EngineError::new(9, "model corrupt").is_transient());
    }

    /// Engine that records activate/deactivate calls.
    struct TraceEngine {
        log: Mutex<Vec<String>>,
    }

    impl SolverEngine for TraceEngine {
        fn activate(&self, case_id: &str) -> Result<(), EngineError> {
            self.log.lock().unwrap().push(format!("activate {case_id}"));
            Ok(())
        }

        fn deactivate(&self, case_id: &str) -> Result<(), EngineError> {
            self.log.lock().unwrap().push(format!("deactivate {case_id}"));
            Ok(())
        }

        fn can_resolve(&self, _: &str, _: &str) -> bool {
            true
        }

        fn run_feasibility(&self, _: &CaseVariant) -> Result<StatusCode, EngineError> {
            Ok(0)
        }

        fn run_scan(&self, _: &CaseVariant) -> Result<PathBuf, EngineError> {
            Err(EngineError::new(9, "unsupported"))
        }

        fn submit_batch(
            &self,
            _: &[CaseVariant],
            _: bool,
            _: Duration,
        ) -> Result<Vec<CaseScanRecord>, EngineError> {
            Err(EngineError::new(9, "unsupported"))
        }
    }

    #[test]
    fn active_case_deactivates_on_drop() {
        let engine = TraceEngine {
            log: Mutex::new(Vec::new()),
        };
        {
            let _guard = ActiveCase::acquire(&engine, "BASE_Intact").unwrap();
        }
        let log = engine.log.lock().unwrap();
        assert_eq!(
            *log,
            vec!["activate BASE_Intact", "deactivate BASE_Intact"]
        );
    }

    #[test]
    fn explicit_release_does_not_double_deactivate() {
        let engine = TraceEngine {
            log: Mutex::new(Vec::new()),
        };
        let guard = ActiveCase::acquire(&engine, "X").unwrap();
        guard.release().unwrap();
        let log = engine.log.lock().unwrap();
        assert_eq!(log.iter().filter(|l| l.starts_with("deactivate")).count(), 1);
    }
}
