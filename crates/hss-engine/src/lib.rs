//! # hss-engine: engine boundary, feasibility gate and scheduler
//!
//! Policy wrapped around the external solver/execution engine: the
//! [`SolverEngine`] boundary trait with its opaque status-code
//! classification, the scoped [`ActiveCase`] guard for the engine's single
//! active-case context, the feasibility gate that prunes numerically
//! unusable variants, and the scheduler that batches convergent variants
//! into the engine's execution facility with retry and serial fallback.
//!
//! True parallelism lives inside the engine; everything here is sequential
//! policy.

pub mod engine;
pub mod gate;
pub mod schedule;
pub mod sim;

pub use engine::{
    classify_feasibility, ActiveCase, CaseScanRecord, EngineError, EngineResolver,
    FeasibilityOutcome, SolverEngine, StatusCode, CODE_CONVERGENT, CODE_TIMEOUT, DIVERGENCE_CODES,
    TRANSIENT_CODES,
};
pub use gate::{check_feasibility, GateReport, PrunedBaseCase};
pub use schedule::{schedule, BatchDisposition, BatchRecord, ExecutionReport};
pub use sim::{SimEngine, SimTerminal};
