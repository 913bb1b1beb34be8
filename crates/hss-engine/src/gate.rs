//! Feasibility gate: convergence-based pruning of candidate variants.
//!
//! Each variant gets exactly one feasibility round-trip to the engine,
//! executed sequentially because the one-active-case-at-a-time session rule
//! forbids concurrent checks and because pruning decisions depend on
//! earlier results: the Intact variant of a base case is resolved first,
//! and a non-convergent Intact prunes every sibling of that base case
//! without individual checks.
//!
//! A base case counts as convergent when its Intact variant converged. Zero
//! convergent base cases is the only fatal outcome here; everything else is
//! status bookkeeping and diagnostics.

use std::time::Instant;
use tracing::{info, warn};

use hss_core::{Diagnostics, HssError, HssResult};
use hss_study::{CaseStatus, CaseVariant};

use crate::engine::{classify_feasibility, ActiveCase, FeasibilityOutcome, SolverEngine};

/// A base case removed from the run, with the reason reported once.
#[derive(Debug, Clone)]
pub struct PrunedBaseCase {
    pub base_case: String,
    pub reason: String,
    /// Sibling variants pruned without individual checks.
    pub pruned_variants: usize,
}

/// Outcome of the feasibility stage.
#[derive(Debug, Default)]
pub struct GateReport {
    pub convergent: usize,
    pub non_convergent: usize,
    pub skipped: usize,
    /// Base cases whose whole variant set was pruned.
    pub pruned_base_cases: Vec<PrunedBaseCase>,
    pub diagnostics: Diagnostics,
}

impl GateReport {
    /// Base cases that survived the gate.
    pub fn is_pruned(&self, base_case: &str) -> bool {
        self.pruned_base_cases.iter().any(|p| p.base_case == base_case)
    }
}

/// Run the feasibility gate over all candidate variants, mutating statuses
/// in place.
///
/// Idempotent per variant: a variant already in a terminal status keeps it
/// without another engine round-trip. Fails fatally only when no base case
/// reaches a convergent Intact variant.
pub fn check_feasibility(
    engine: &dyn SolverEngine,
    variants: &mut [CaseVariant],
) -> HssResult<GateReport> {
    let mut report = GateReport::default();

    // Base cases in first-seen order.
    let mut bases: Vec<String> = Vec::new();
    for variant in variants.iter() {
        if !bases.contains(&variant.base_case) {
            bases.push(variant.base_case.clone());
        }
    }

    let mut convergent_bases = 0usize;
    for base in &bases {
        let member_idxs: Vec<usize> = variants
            .iter()
            .enumerate()
            .filter(|(_, v)| &v.base_case == base)
            .map(|(i, _)| i)
            .collect();

        // The canonical Intact variant anchors the base case's feasibility.
        let intact_idx = member_idxs
            .iter()
            .copied()
            .find(|&i| variants[i].is_intact());

        let intact_converged = match intact_idx {
            Some(idx) => {
                let outcome = check_one(engine, &mut variants[idx]);
                tally(&mut report, &variants[idx].status);
                if let Some(FeasibilityOutcome::NonConvergent(code)) = outcome {
                    prune_siblings(variants, &member_idxs, idx, base, code, &mut report);
                    continue;
                }
                matches!(variants[idx].status, CaseStatus::Convergent)
            }
            None => {
                report.diagnostics.add_warning_with_entity(
                    "feasibility",
                    "base case has no Intact variant; checking siblings individually",
                    base,
                );
                false
            }
        };
        if intact_converged {
            convergent_bases += 1;
        }

        for idx in member_idxs {
            if Some(idx) == intact_idx {
                continue;
            }
            check_one(engine, &mut variants[idx]);
            tally(&mut report, &variants[idx].status);
        }
    }

    if !report.pruned_base_cases.is_empty() {
        let listing = report
            .pruned_base_cases
            .iter()
            .map(|p| format!("{} ({})", p.base_case, p.reason))
            .collect::<Vec<_>>()
            .join(", ");
        report.diagnostics.add_warning(
            "feasibility",
            &format!("pruned base cases: {}", listing),
        );
        warn!("pruned base cases: {}", listing);
    }

    if convergent_bases == 0 {
        report
            .diagnostics
            .add_critical("feasibility", "no base case reached a convergent Intact variant");
        return Err(HssError::Fatal(
            "no convergent base case; nothing downstream is possible".into(),
        ));
    }

    info!(
        convergent = report.convergent,
        non_convergent = report.non_convergent,
        skipped = report.skipped,
        "feasibility gate finished"
    );
    Ok(report)
}

/// Check one variant, storing the resulting status. Returns the raw
/// classification when an engine round-trip actually happened.
fn check_one(engine: &dyn SolverEngine, variant: &mut CaseVariant) -> Option<FeasibilityOutcome> {
    if variant.status.is_terminal() {
        return None;
    }
    variant.status = CaseStatus::Checking;
    let started = Instant::now();

    let guard = match ActiveCase::acquire(engine, &variant.id) {
        Ok(guard) => guard,
        Err(err) => {
            variant.status = CaseStatus::Skipped {
                reason: format!("activation failed: {err}"),
            };
            return None;
        }
    };

    let outcome = match engine.run_feasibility(variant) {
        Ok(code) => classify_feasibility(code),
        Err(err) => {
            variant.status = CaseStatus::Skipped {
                reason: format!("feasibility call failed: {err}"),
            };
            drop(guard);
            return None;
        }
    };
    drop(guard);

    let elapsed = started.elapsed();
    variant.status = match &outcome {
        FeasibilityOutcome::Convergent => CaseStatus::Convergent,
        FeasibilityOutcome::NonConvergent(code) => CaseStatus::NonConvergent {
            reason: format!("divergence code {code}"),
        },
        FeasibilityOutcome::Skipped(code) => CaseStatus::Skipped {
            reason: format!("solver code {code}"),
        },
    };
    info!(
        case = %variant.id,
        status = variant.status.label(),
        elapsed_ms = elapsed.as_millis() as u64,
        "feasibility check"
    );
    Some(outcome)
}

fn prune_siblings(
    variants: &mut [CaseVariant],
    member_idxs: &[usize],
    intact_idx: usize,
    base: &str,
    code: i32,
    report: &mut GateReport,
) {
    let reason = format!("base case Intact diverged (code {code})");
    let mut pruned = 0usize;
    for &idx in member_idxs {
        if idx == intact_idx || variants[idx].status.is_terminal() {
            continue;
        }
        variants[idx].status = CaseStatus::Skipped {
            reason: reason.clone(),
        };
        report.skipped += 1;
        pruned += 1;
    }
    report.pruned_base_cases.push(PrunedBaseCase {
        base_case: base.to_string(),
        reason,
        pruned_variants: pruned,
    });
}

fn tally(report: &mut GateReport, status: &CaseStatus) {
    match status {
        CaseStatus::Convergent => report.convergent += 1,
        CaseStatus::NonConvergent { .. } => report.non_convergent += 1,
        CaseStatus::Skipped { .. } => report.skipped += 1,
        _ => {}
    }
}
