//! Multi-run result aggregation.
//!
//! Merges raw exports from any number of runs into one keyed dataset:
//! recomputes THD from the per-order magnitudes actually present (embedded
//! THD values are unreliable across study types), collapses byte-identical
//! repeats, renames same-key-different-value collisions with deterministic
//! `(n)` suffixes reported once, and fails hard only when no export parses
//! or a duplicate key survives renaming.
//!
//! First-seen order is the precedence order: callers supply inputs in a
//! meaningful order when collision naming matters.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use tracing::{info, warn};

use hss_core::{AggregateSettings, Diagnostics, HssError, HssResult};

use crate::dataset::{millihertz, MergedDataset, RenameNote, ResultRow};
use crate::export::{parse_export, ExportContext, ParsedExport, THD_SOURCE_VARIABLE, THD_VARIABLE};

/// Merge raw exports into one dataset.
pub fn aggregate(
    export_paths: &[PathBuf],
    ctx: &ExportContext,
    settings: &AggregateSettings,
) -> HssResult<MergedDataset> {
    let mut diagnostics = Diagnostics::new();
    let mut parsed = Vec::with_capacity(export_paths.len());
    for path in export_paths {
        match parse_export(path, ctx) {
            Ok(export) => parsed.push(export),
            Err(err) => {
                diagnostics.add_error_with_entity(
                    "merge",
                    &format!("export excluded: {err:#}"),
                    &path.display().to_string(),
                );
                warn!(path = %path.display(), "skipping unparsable export: {err:#}");
            }
        }
    }
    let merged_files = parsed.len();
    let expected_files = export_paths.len();
    diagnostics.add_info(
        "merge",
        &format!("merged {merged_files} of {expected_files} exports"),
    );
    if merged_files == 0 {
        return Err(HssError::Fatal(
            "no export file could be parsed; nothing to aggregate".into(),
        ));
    }

    for export in &mut parsed {
        if settings.recompute_thd && export.harmonic_domain {
            recompute_thd(export, settings.max_harmonic_order, ctx.nominal_frequency_hz());
        }
        diagnostics.merge(std::mem::take(&mut export.diagnostics));
    }

    // Variable precedence: the whitelist order when given, first-seen order
    // across inputs otherwise.
    let mut variables: Vec<String> = Vec::new();
    let mut seen_variables = HashSet::new();
    for export in &parsed {
        for row in &export.rows {
            if seen_variables.insert(row.key.variable.clone()) {
                variables.push(row.key.variable.clone());
            }
        }
    }
    if !settings.variable_whitelist.is_empty() {
        variables = settings
            .variable_whitelist
            .iter()
            .filter(|v| seen_variables.contains(*v))
            .cloned()
            .collect();
    }
    let keep: HashSet<&String> = variables.iter().collect();

    let mut nominal_kv: HashMap<String, f64> = HashMap::new();
    for export in &parsed {
        for (terminal, kv) in &export.nominal_kv {
            if let Some(existing) = nominal_kv.get(terminal) {
                if (existing - kv).abs() > 1e-9 {
                    diagnostics.add_warning_with_entity(
                        "merge",
                        &format!(
                            "conflicting nominal voltage ({existing} vs {kv}); keeping first"
                        ),
                        terminal,
                    );
                }
            } else {
                nominal_kv.insert(terminal.clone(), *kv);
            }
        }
    }

    let (rows, renames) = deduplicate(
        parsed
            .into_iter()
            .flat_map(|e| e.rows)
            .filter(|r| keep.contains(&r.key.variable)),
    )?;

    if !renames.is_empty() {
        let listing = renames
            .iter()
            .map(|r| format!("{} -> {}", r.original, r.renamed_to))
            .collect::<Vec<_>>()
            .join(", ");
        diagnostics.add_warning("merge", &format!("collision renames: {listing}"));
        warn!("collision renames: {listing}");
    }

    info!(
        rows = rows.len(),
        variables = variables.len(),
        merged_files,
        expected_files,
        "aggregation finished"
    );
    Ok(MergedDataset {
        rows,
        variables,
        nominal_kv,
        renames,
        merged_files,
        expected_files,
        diagnostics,
    })
}

/// Collapse true repeats and rename same-key-different-value conflicts.
fn deduplicate(
    rows: impl Iterator<Item = ResultRow>,
) -> HssResult<(Vec<ResultRow>, Vec<RenameNote>)> {
    let mut out: Vec<ResultRow> = Vec::new();
    let mut index: HashMap<crate::dataset::ResultKey, usize> = HashMap::new();
    let mut suffixes: HashMap<crate::dataset::ResultKey, u32> = HashMap::new();
    let mut renames: Vec<RenameNote> = Vec::new();
    let mut noted: HashSet<(String, String)> = HashSet::new();

    for row in rows {
        let Some(&existing_idx) = index.get(&row.key) else {
            index.insert(row.key.clone(), out.len());
            out.push(row);
            continue;
        };
        if out[existing_idx].is_identical(&row) {
            // True repeat (same case exported twice); collapse.
            continue;
        }
        // A repeat of an already-renamed conflict collapses onto the suffix
        // it was given the first time rather than taking a fresh one.
        let taken = suffixes.get(&row.key).copied().unwrap_or(0);
        let already_renamed = (1..=taken).any(|n| {
            let candidate = with_suffix(&row, n);
            index
                .get(&candidate.key)
                .is_some_and(|&idx| out[idx].is_identical(&candidate))
        });
        if already_renamed {
            continue;
        }
        let n = taken + 1;
        suffixes.insert(row.key.clone(), n);
        let renamed = with_suffix(&row, n);
        if let Some(&renamed_idx) = index.get(&renamed.key) {
            if out[renamed_idx].is_identical(&renamed) {
                continue;
            }
            // Renaming is deterministic, so a surviving duplicate means an
            // upstream invariant broke.
            return Err(HssError::Aggregate(format!(
                "duplicate key survived collision renaming: {}/{}/{}",
                renamed.key.terminal, renamed.key.study_case, renamed.key.variable
            )));
        }
        if noted.insert((row.full_name.clone(), renamed.full_name.clone())) {
            renames.push(RenameNote {
                original: row.full_name.clone(),
                renamed_to: renamed.full_name.clone(),
            });
        }
        index.insert(renamed.key.clone(), out.len());
        out.push(renamed);
    }
    Ok((out, renames))
}

fn with_suffix(row: &ResultRow, n: u32) -> ResultRow {
    let mut renamed = row.clone();
    renamed.key.study_case = format!("{}({})", row.key.study_case, n);
    renamed.full_name = format!("{}({})", row.full_name, n);
    renamed
}

/// Replace embedded THD with the root-sum-square of the per-order
/// magnitudes actually present, up to `max_order`.
fn recompute_thd(export: &mut ParsedExport, max_order: u32, nominal_frequency_hz: f64) {
    export.rows.retain(|r| r.key.variable != THD_VARIABLE);

    let mut squares: BTreeMap<String, f64> = BTreeMap::new();
    for row in &export.rows {
        if row.key.variable != THD_SOURCE_VARIABLE {
            continue;
        }
        match row.key.harmonic_order {
            Some(order) if (2..=max_order).contains(&order) => {
                *squares.entry(row.key.terminal.clone()).or_insert(0.0) +=
                    row.value * row.value;
            }
            _ => {}
        }
    }

    for (terminal, sum) in squares {
        let template = export
            .rows
            .iter()
            .find(|r| r.key.terminal == terminal && r.key.variable == THD_SOURCE_VARIABLE)
            .map(|r| r.key.clone());
        let Some(mut key) = template else { continue };
        key.variable = THD_VARIABLE.to_string();
        key.harmonic_order = Some(1);
        key.frequency_mhz = millihertz(nominal_frequency_hz);
        let full_name = export
            .rows
            .first()
            .map(|r| r.full_name.clone())
            .unwrap_or_default();
        export.rows.push(ResultRow {
            key,
            value: sum.sqrt(),
            full_name,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hss_study::TerminalRef;
    use std::fs;
    use std::path::Path;

    fn context() -> ExportContext {
        let terminals = vec![TerminalRef {
            name: "PCC".into(),
            locations: vec!["bus/PCC".into()],
            include_in_transfer_impedance: false,
        }];
        ExportContext::new(&terminals, &[], 50.0)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const EXPORT_A: &str = "\
# study_case=BASE
# contingency=Intact
scale:harmonic,bus/PCC|m:R,bus/PCC|m:Uharm,bus/PCC|m:THD
1,10.0,100.0,9.99
5,12.3,3.0,9.99
7,14.0,4.0,9.99
";

    #[test]
    fn merging_the_same_export_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", EXPORT_A);
        let b = write(dir.path(), "b.csv", EXPORT_A);
        let once = aggregate(&[a.clone()], &context(), &AggregateSettings::default()).unwrap();
        let twice = aggregate(&[a, b], &context(), &AggregateSettings::default()).unwrap();
        assert_eq!(once.len(), twice.len());
        assert!(twice.renames.is_empty());
    }

    #[test]
    fn remerging_a_renamed_conflict_is_idempotent() {
        let conflicting =
            "# study_case=BASE\n# contingency=Intact\nscale:hz,bus/PCC|m:Z\n100,45.6\n";
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.csv",
            "# study_case=BASE\n# contingency=Intact\nscale:hz,bus/PCC|m:Z\n100,12.3\n",
        );
        let b = write(dir.path(), "b.csv", conflicting);
        let b_again = write(dir.path(), "b_again.csv", conflicting);
        let once =
            aggregate(&[a.clone(), b.clone()], &context(), &AggregateSettings::default()).unwrap();
        let twice = aggregate(&[a, b, b_again], &context(), &AggregateSettings::default()).unwrap();
        // the repeat collapses onto its existing (1) suffix
        assert_eq!(once.len(), twice.len());
        let cases: Vec<_> = twice.rows.iter().map(|r| r.key.study_case.as_str()).collect();
        assert!(cases.contains(&"BASE"));
        assert!(cases.contains(&"BASE(1)"));
        assert!(!cases.contains(&"BASE(2)"));
        assert_eq!(twice.renames.len(), 1);
    }

    #[test]
    fn conflicting_values_are_renamed_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.csv",
            "# study_case=BASE\n# contingency=Intact\nscale:hz,bus/PCC|m:Z\n100,12.3\n",
        );
        let b = write(
            dir.path(),
            "b.csv",
            "# study_case=BASE\n# contingency=Intact\nscale:hz,bus/PCC|m:Z\n100,45.6\n",
        );
        let merged = aggregate(&[a, b], &context(), &AggregateSettings::default()).unwrap();
        assert_eq!(merged.len(), 2);
        let cases: Vec<_> = merged.rows.iter().map(|r| r.key.study_case.as_str()).collect();
        assert!(cases.contains(&"BASE"));
        assert!(cases.contains(&"BASE(1)"));
        assert_eq!(merged.renames.len(), 1);
        assert_eq!(merged.renames[0].renamed_to, "BASE_Intact(1)");
        // both values survive
        let mut values: Vec<f64> = merged.rows.iter().map(|r| r.value).collect();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![12.3, 45.6]);
    }

    #[test]
    fn identical_key_and_value_collapse_to_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.csv",
            "# study_case=BASE\n# contingency=Intact\nscale:hz,bus/PCC|m:Z\n100,12.3\n",
        );
        let b = write(
            dir.path(),
            "b.csv",
            "# study_case=BASE\n# contingency=Intact\nscale:hz,bus/PCC|m:Z\n100,12.3\n",
        );
        let merged = aggregate(&[a, b], &context(), &AggregateSettings::default()).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.rows[0].value, 12.3);
    }

    #[test]
    fn thd_is_recomputed_from_present_orders() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", EXPORT_A);
        let merged = aggregate(&[a], &context(), &AggregateSettings::default()).unwrap();
        let thd: Vec<_> = merged
            .rows
            .iter()
            .filter(|r| r.key.variable == THD_VARIABLE)
            .collect();
        assert_eq!(thd.len(), 1);
        // sqrt(3^2 + 4^2) = 5, the fundamental (order 1) is excluded
        assert!((thd[0].value - 5.0).abs() < 1e-9);
        assert_eq!(thd[0].key.harmonic_order, Some(1));
        // the embedded 9.99 values are gone
        assert!(merged.rows.iter().all(|r| (r.value - 9.99).abs() > 1e-9));
    }

    #[test]
    fn whitelist_sets_variable_precedence_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", EXPORT_A);
        let settings = AggregateSettings {
            variable_whitelist: vec!["m:Uharm".into(), "m:R".into()],
            recompute_thd: false,
            ..Default::default()
        };
        let merged = aggregate(&[a], &context(), &settings).unwrap();
        assert_eq!(merged.variables, vec!["m:Uharm", "m:R"]);
        assert!(merged.rows.iter().all(|r| r.key.variable != THD_VARIABLE));
    }

    #[test]
    fn first_seen_variable_order_without_whitelist() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", EXPORT_A);
        let settings = AggregateSettings {
            recompute_thd: false,
            ..Default::default()
        };
        let merged = aggregate(&[a], &context(), &settings).unwrap();
        assert_eq!(merged.variables, vec!["m:R", "m:Uharm", "m:THD"]);
    }

    #[test]
    fn unparsable_exports_are_skipped_with_a_count() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "good.csv", EXPORT_A);
        let bad = write(dir.path(), "bad.csv", "not an export at all");
        let merged = aggregate(&[bad, good], &context(), &AggregateSettings::default()).unwrap();
        assert_eq!(merged.merged_files, 1);
        assert_eq!(merged.expected_files, 2);
        assert!(merged.diagnostics.has_errors());
    }

    #[test]
    fn zero_parseable_exports_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.csv", "nope");
        let result = aggregate(&[bad], &context(), &AggregateSettings::default());
        assert!(matches!(result, Err(HssError::Fatal(_))));
    }

    #[test]
    fn nominal_voltage_is_merged_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.csv",
            "# study_case=A\n# contingency=Intact\nscale:hz,bus/PCC|m:Z,bus/PCC|e:uknom\n100,1.0,132.0\n",
        );
        let b = write(
            dir.path(),
            "b.csv",
            "# study_case=B\n# contingency=Intact\nscale:hz,bus/PCC|m:Z,bus/PCC|e:uknom\n100,2.0,220.0\n",
        );
        let merged = aggregate(&[a, b], &context(), &AggregateSettings::default()).unwrap();
        assert_eq!(merged.nominal_kv.get("PCC"), Some(&132.0));
        assert!(merged.diagnostics.warning_count() >= 1);
    }
}
