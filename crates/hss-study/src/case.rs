//! Case model: base cases, contingencies, filter variants and the derived
//! case variants a study run works through.
//!
//! All records here are plain typed data validated once at spec-resolution
//! time. A [`CaseVariant`]'s status is mutated only by the feasibility gate,
//! and its export location only by the scheduler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reserved contingency name for the no-outage case.
pub const INTACT_NAME: &str = "Intact";

/// The unperturbed starting scenario before any contingency is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCase {
    /// Unique user-facing name, also the study-case key in merged results.
    pub name: String,
    /// Pointer to the network model inside the external engine.
    pub network_reference: String,
    /// Named load-flow configuration the engine should use.
    pub load_flow_config: Option<String>,
    /// Named frequency-scan configuration the engine should use.
    pub scan_config: Option<String>,
}

/// Target state for a breaker/coupler toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Open,
    Closed,
}

/// One equipment state change within a contingency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementAction {
    /// Breaker/coupler state toggle.
    Switch { element: String, state: SwitchState },
    /// Branch taken out of service.
    Outage { element: String },
}

impl ElementAction {
    /// The model element this action targets.
    pub fn element(&self) -> &str {
        match self {
            ElementAction::Switch { element, .. } => element,
            ElementAction::Outage { element } => element,
        }
    }
}

/// A named set of equipment state changes applied to a base case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contingency {
    pub name: String,
    pub actions: Vec<ElementAction>,
}

impl Contingency {
    /// The reserved no-outage contingency.
    pub fn intact() -> Self {
        Self {
            name: INTACT_NAME.to_string(),
            actions: Vec::new(),
        }
    }

    pub fn is_intact(&self) -> bool {
        self.name == INTACT_NAME
    }
}

/// One (tuning frequency, reactive size) point of a filter sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterTap {
    pub tuning_frequency_hz: f64,
    pub size_mvar: f64,
}

impl FilterTap {
    /// Human-readable label embedded in variant ids, one decimal each.
    pub fn label(&self) -> String {
        format!("{:.1}Hz_{:.1}Mvar", self.tuning_frequency_hz, self.size_mvar)
    }
}

/// A parametrised filter device swept over a grid of taps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterVariant {
    pub name: String,
    /// Model element the filter is attached to.
    pub target_element: String,
    pub taps: Vec<FilterTap>,
}

/// A concrete filter setting applied to one case variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterApplication {
    pub filter_name: String,
    pub tap: FilterTap,
}

impl FilterApplication {
    pub fn label(&self) -> String {
        format!("{}_{}", self.filter_name, self.tap.label())
    }
}

/// Lifecycle status of a case variant.
///
/// `Created → Checking → {Convergent, NonConvergent, Skipped}`; the
/// scheduler may later move a Convergent variant to `Failed` when its batch
/// fails after serial fallback. Statuses are values, never raised errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaseStatus {
    Created,
    Checking,
    Convergent,
    NonConvergent { reason: String },
    Skipped { reason: String },
    Failed { reason: String },
}

impl CaseStatus {
    /// Terminal statuses are never re-checked by the gate.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CaseStatus::Created | CaseStatus::Checking)
    }

    /// Only convergent variants may proceed to scheduling.
    pub fn may_schedule(&self) -> bool {
        matches!(self, CaseStatus::Convergent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaseStatus::Created => "created",
            CaseStatus::Checking => "checking",
            CaseStatus::Convergent => "convergent",
            CaseStatus::NonConvergent { .. } => "non-convergent",
            CaseStatus::Skipped { .. } => "skipped",
            CaseStatus::Failed { .. } => "failed",
        }
    }
}

/// One concrete (base case, contingency, optional filter tap) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseVariant {
    /// Deterministic id: `base_contingency[_filterlabel]`.
    pub id: String,
    pub base_case: String,
    pub contingency: Contingency,
    pub filter: Option<FilterApplication>,
    pub status: CaseStatus,
    /// Raw result export produced by the scan, recorded by the scheduler.
    pub result_export: Option<PathBuf>,
}

impl CaseVariant {
    pub fn new(
        base_case: &BaseCase,
        contingency: Contingency,
        filter: Option<FilterApplication>,
    ) -> Self {
        let id = match &filter {
            Some(application) => format!(
                "{}_{}_{}",
                base_case.name,
                contingency.name,
                application.label()
            ),
            None => format!("{}_{}", base_case.name, contingency.name),
        };
        Self {
            id,
            base_case: base_case.name.clone(),
            contingency,
            filter,
            status: CaseStatus::Created,
            result_export: None,
        }
    }

    pub fn is_intact(&self) -> bool {
        self.contingency.is_intact()
    }
}
