//! Execution scheduler: batch composition and submission policy.
//!
//! All convergent variants of one base case form one batch submitted to the
//! engine's bounded-concurrency execution facility. The scheduler owns only
//! the policy around that facility: retry with fixed delay on transient
//! codes, one strictly-serial resubmission when parallel submission
//! ultimately errors, and per-call timeouts classified as transient.
//!
//! A failed batch keeps its temporary artifacts for diagnosis and never
//! aborts sibling batches.

use tracing::{error, info, warn};

use hss_core::{retry_with_backoff, Diagnostics, ScheduleSettings};
use hss_study::{CaseStatus, CaseVariant};

use crate::engine::{CaseScanRecord, EngineError, SolverEngine};

/// Final disposition of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDisposition {
    Completed,
    /// Failed after retries and serial fallback; artifacts retained.
    Failed,
}

/// Outcome of one base-case batch.
#[derive(Debug)]
pub struct BatchRecord {
    pub base_case: String,
    pub disposition: BatchDisposition,
    /// Submission attempts, including the serial fallback when taken.
    pub attempts: u32,
    pub serial_fallback: bool,
    pub error: Option<String>,
    pub cases: Vec<CaseScanRecord>,
}

/// Outcome of the scheduling stage.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub batches: Vec<BatchRecord>,
    /// Variants whose scan produced a recorded export.
    pub executed: usize,
    pub failed_batches: usize,
    pub diagnostics: Diagnostics,
}

/// Submit every convergent variant, batched per base case, recording export
/// locations on the variants.
pub fn schedule(
    engine: &dyn SolverEngine,
    variants: &mut [CaseVariant],
    settings: &ScheduleSettings,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    let mut bases: Vec<String> = Vec::new();
    for variant in variants.iter().filter(|v| v.status.may_schedule()) {
        if !bases.contains(&variant.base_case) {
            bases.push(variant.base_case.clone());
        }
    }

    for base in &bases {
        let member_idxs: Vec<usize> = variants
            .iter()
            .enumerate()
            .filter(|(_, v)| &v.base_case == base && v.status.may_schedule())
            .map(|(i, _)| i)
            .collect();
        let batch: Vec<CaseVariant> = member_idxs.iter().map(|&i| variants[i].clone()).collect();

        info!(base_case = %base, cases = batch.len(), "submitting batch");
        let record = submit_with_policy(engine, base, &batch, settings);

        match record.disposition {
            BatchDisposition::Completed => {
                for case in &record.cases {
                    let Some(&idx) = member_idxs
                        .iter()
                        .find(|&&i| variants[i].id == case.case_id)
                    else {
                        continue;
                    };
                    if let Some(export) = &case.export {
                        variants[idx].result_export = Some(export.clone());
                        report.executed += 1;
                    }
                    if let Some(err) = &case.error {
                        variants[idx].status = CaseStatus::Failed {
                            reason: err.clone(),
                        };
                        report.diagnostics.add_error_with_entity(
                            "schedule",
                            "scan failed",
                            &case.case_id,
                        );
                    }
                }
            }
            BatchDisposition::Failed => {
                let reason = record
                    .error
                    .clone()
                    .unwrap_or_else(|| "batch failed".to_string());
                for &idx in &member_idxs {
                    variants[idx].status = CaseStatus::Failed {
                        reason: format!("batch failed: {reason}"),
                    };
                }
                report.failed_batches += 1;
                report.diagnostics.add_error_with_entity(
                    "schedule",
                    &format!(
                        "batch failed after {} attempts{}; artifacts retained for diagnosis: {}",
                        record.attempts,
                        if record.serial_fallback {
                            " including serial fallback"
                        } else {
                            ""
                        },
                        reason
                    ),
                    base,
                );
                error!(base_case = %base, "batch failed; artifacts retained: {reason}");
            }
        }
        report.batches.push(record);
    }

    info!(
        batches = report.batches.len(),
        executed = report.executed,
        failed_batches = report.failed_batches,
        "scheduling finished"
    );
    report
}

/// Retry policy wrapped around one batch: transient-code retries on the
/// configured mode, then one strictly serial resubmission if the parallel
/// path ultimately errored.
fn submit_with_policy(
    engine: &dyn SolverEngine,
    base: &str,
    batch: &[CaseVariant],
    settings: &ScheduleSettings,
) -> BatchRecord {
    let policy = settings.retry_policy();
    let timeout = settings.call_timeout();
    let mut attempts = 0u32;

    let first_pass = retry_with_backoff(&policy, EngineError::is_transient, |_attempt| {
        attempts += 1;
        engine.submit_batch(batch, settings.parallel, timeout)
    });

    match first_pass {
        Ok(cases) => BatchRecord {
            base_case: base.to_string(),
            disposition: BatchDisposition::Completed,
            attempts,
            serial_fallback: false,
            error: None,
            cases,
        },
        Err(err) if settings.parallel => {
            warn!(
                base_case = %base,
                "parallel submission failed ({err}); falling back to serial"
            );
            attempts += 1;
            match engine.submit_batch(batch, false, timeout) {
                Ok(cases) => BatchRecord {
                    base_case: base.to_string(),
                    disposition: BatchDisposition::Completed,
                    attempts,
                    serial_fallback: true,
                    error: None,
                    cases,
                },
                Err(serial_err) => BatchRecord {
                    base_case: base.to_string(),
                    disposition: BatchDisposition::Failed,
                    attempts,
                    serial_fallback: true,
                    error: Some(serial_err.to_string()),
                    cases: Vec::new(),
                },
            }
        }
        Err(err) => BatchRecord {
            base_case: base.to_string(),
            disposition: BatchDisposition::Failed,
            attempts,
            serial_fallback: false,
            error: Some(err.to_string()),
            cases: Vec::new(),
        },
    }
}
