//! # hss-study: Study model and case expansion
//!
//! Turns a study document into typed records ([`BaseCase`], [`Contingency`],
//! [`FilterVariant`], [`TerminalRef`]) and expands them into the full set of
//! candidate [`CaseVariant`]s with deterministic, collision-checked ids.
//!
//! The physical duplication of model state for a variant is the external
//! engine's job; this crate only decides what exists and what it is called.

pub mod case;
pub mod expand;
pub mod spec;
pub mod terminals;

pub use case::{
    BaseCase, CaseStatus, CaseVariant, Contingency, ElementAction, FilterApplication, FilterTap,
    FilterVariant, SwitchState, INTACT_NAME,
};
pub use expand::{expand, ElementResolver, Expansion, ResolveAll};
pub use spec::{load_study_from_path, resolve_study, ResolvedStudy, StudySet};
pub use terminals::{derive_mutual_pairs, MutualPairRef, TerminalRef, MUTUAL_NAME_LIMIT};
