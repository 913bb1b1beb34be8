//! Raw result export parsing.
//!
//! One export file per executed case, in the engine's tabular CSV layout:
//! leading `# key=value` metadata lines naming the producing case, a header
//! row whose first cell is the scale kind (`scale:harmonic` or `scale:hz`)
//! and whose remaining cells encode `location_path|variable_name`, then one
//! row per frequency sample.
//!
//! Harmonic-domain scales are expressed in harmonic order and corrected to
//! Hz with the configured nominal frequency. Columns that are pure scale
//! metadata are tagged and dropped rather than treated as data. Mutual
//! (transfer) measurement columns are split into two mirrored records so
//! both terminals can be queried symmetrically.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use hss_core::Diagnostics;
use hss_study::{MutualPairRef, TerminalRef};

use crate::dataset::{millihertz, ResultKey, ResultRow, NO_FILTER};

/// Variable carrying a terminal's nominal voltage (reserved, not data).
pub const NOMINAL_VOLTAGE_VARIABLE: &str = "e:uknom";

/// Scale metadata variable occasionally exported as a normal column.
pub const SCALE_VARIABLE: &str = "b:fnow";

/// THD variable name; embedded values are dropped and recomputed.
pub const THD_VARIABLE: &str = "m:THD";

/// Per-order harmonic magnitude variable THD is recomputed from.
pub const THD_SOURCE_VARIABLE: &str = "m:Uharm";

/// Lookup context mapping export locations back to study terminals.
#[derive(Debug, Clone, Default)]
pub struct ExportContext {
    location_to_terminal: HashMap<String, String>,
    mutual_by_used_name: HashMap<String, (String, String)>,
    nominal_frequency_hz: f64,
}

impl ExportContext {
    pub fn new(
        terminals: &[TerminalRef],
        mutual_pairs: &[MutualPairRef],
        nominal_frequency_hz: f64,
    ) -> Self {
        let mut location_to_terminal = HashMap::new();
        for terminal in terminals {
            for location in &terminal.locations {
                location_to_terminal.insert(location.clone(), terminal.name.clone());
            }
        }
        let mutual_by_used_name = mutual_pairs
            .iter()
            .map(|p| (p.used_name.clone(), (p.from.clone(), p.to.clone())))
            .collect();
        Self {
            location_to_terminal,
            mutual_by_used_name,
            nominal_frequency_hz,
        }
    }

    pub fn nominal_frequency_hz(&self) -> f64 {
        self.nominal_frequency_hz
    }
}

/// One parsed raw export.
#[derive(Debug)]
pub struct ParsedExport {
    pub study_case: String,
    pub contingency: String,
    pub filter_id: String,
    pub harmonic_domain: bool,
    pub rows: Vec<ResultRow>,
    /// Nominal voltage per terminal, from the reserved voltage rows.
    pub nominal_kv: HashMap<String, f64>,
    /// Columns tagged as pure scale metadata and removed.
    pub dropped_scale_columns: usize,
    pub diagnostics: Diagnostics,
}

enum ColumnKind {
    /// Plain terminal measurement.
    Terminal { terminal: String, variable: String },
    /// Mutual measurement mirrored into both directions.
    Mutual {
        forward: String,
        backward: String,
        variable: String,
    },
    /// Nominal-voltage reserved column.
    NominalVoltage { terminal: String },
    /// Scale metadata, dropped.
    Scale,
    /// Unusable header cell, dropped with a diagnostic.
    Dropped,
}

/// Parse one raw export file.
pub fn parse_export(path: &Path, ctx: &ExportContext) -> Result<ParsedExport> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading export '{}'", path.display()))?;

    let mut metadata = HashMap::new();
    let mut body_start = 0usize;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix('#') {
            if let Some((key, value)) = rest.trim().split_once('=') {
                metadata.insert(key.trim().to_string(), value.trim().to_string());
            }
            body_start += line.len() + 1;
        } else {
            break;
        }
    }

    let study_case = metadata
        .get("study_case")
        .ok_or_else(|| anyhow!("export '{}' lacks study_case metadata", path.display()))?
        .clone();
    let contingency = metadata
        .get("contingency")
        .ok_or_else(|| anyhow!("export '{}' lacks contingency metadata", path.display()))?
        .clone();
    let filter_id = metadata
        .get("filter")
        .cloned()
        .unwrap_or_else(|| NO_FILTER.to_string());
    let full_name = if filter_id == NO_FILTER {
        format!("{study_case}_{contingency}")
    } else {
        format!("{study_case}_{contingency}_{filter_id}")
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text[body_start..].as_bytes());
    let headers = reader
        .headers()
        .with_context(|| format!("reading export header '{}'", path.display()))?
        .clone();
    if headers.is_empty() {
        return Err(anyhow!("export '{}' has no header row", path.display()));
    }

    let scale_cell = headers.get(0).unwrap_or_default();
    let harmonic_domain = match scale_cell {
        "scale:harmonic" => true,
        "scale:hz" | "scale" => false,
        other => {
            return Err(anyhow!(
                "export '{}' has unrecognised scale column '{}'",
                path.display(),
                other
            ))
        }
    };

    let mut diagnostics = Diagnostics::new();
    let mut dropped_scale_columns = 0usize;
    let columns: Vec<ColumnKind> = headers
        .iter()
        .skip(1)
        .map(|cell| {
            let Some((location, variable)) = cell.split_once('|') else {
                diagnostics.add_warning_with_entity(
                    "parse",
                    "column header without location|variable shape dropped",
                    cell,
                );
                return ColumnKind::Dropped;
            };
            if variable == SCALE_VARIABLE || location == "scale" {
                dropped_scale_columns += 1;
                return ColumnKind::Scale;
            }
            if let Some((from, to)) = ctx.mutual_by_used_name.get(location) {
                return ColumnKind::Mutual {
                    forward: format!("{from}->{to}"),
                    backward: format!("{to}->{from}"),
                    variable: variable.to_string(),
                };
            }
            let terminal = ctx
                .location_to_terminal
                .get(location)
                .cloned()
                .unwrap_or_else(|| location.to_string());
            if variable == NOMINAL_VOLTAGE_VARIABLE {
                ColumnKind::NominalVoltage { terminal }
            } else {
                ColumnKind::Terminal {
                    terminal,
                    variable: variable.to_string(),
                }
            }
        })
        .collect();

    let mut rows = Vec::new();
    let mut nominal_kv = HashMap::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("reading export row {} of '{}'", row_idx, path.display()))?;
        let scale: f64 = record
            .get(0)
            .unwrap_or_default()
            .trim()
            .parse()
            .with_context(|| {
                format!("parsing scale value in row {} of '{}'", row_idx, path.display())
            })?;
        let (frequency_hz, harmonic_order) = if harmonic_domain {
            let order = scale.round().max(0.0) as u32;
            (order as f64 * ctx.nominal_frequency_hz, Some(order))
        } else {
            (scale, None)
        };

        for (col_idx, column) in columns.iter().enumerate() {
            let Some(cell) = record.get(col_idx + 1) else {
                continue;
            };
            let Ok(value) = cell.trim().parse::<f64>() else {
                diagnostics.add_warning(
                    "parse",
                    &format!("non-numeric cell in row {} column {} skipped", row_idx, col_idx + 1),
                );
                continue;
            };
            match column {
                ColumnKind::Scale | ColumnKind::Dropped => {}
                ColumnKind::NominalVoltage { terminal } => {
                    nominal_kv.entry(terminal.clone()).or_insert(value);
                }
                ColumnKind::Terminal { terminal, variable } => {
                    rows.push(make_row(
                        terminal, variable, &study_case, &contingency, &filter_id,
                        frequency_hz, harmonic_order, value, &full_name,
                    ));
                }
                ColumnKind::Mutual {
                    forward,
                    backward,
                    variable,
                } => {
                    rows.push(make_row(
                        forward, variable, &study_case, &contingency, &filter_id,
                        frequency_hz, harmonic_order, value, &full_name,
                    ));
                    rows.push(make_row(
                        backward, variable, &study_case, &contingency, &filter_id,
                        frequency_hz, harmonic_order, value, &full_name,
                    ));
                }
            }
        }
    }

    debug!(
        path = %path.display(),
        rows = rows.len(),
        dropped_scale_columns,
        "parsed export"
    );
    Ok(ParsedExport {
        study_case,
        contingency,
        filter_id,
        harmonic_domain,
        rows,
        nominal_kv,
        dropped_scale_columns,
        diagnostics,
    })
}

#[allow(clippy::too_many_arguments)]
fn make_row(
    terminal: &str,
    variable: &str,
    study_case: &str,
    contingency: &str,
    filter_id: &str,
    frequency_hz: f64,
    harmonic_order: Option<u32>,
    value: f64,
    full_name: &str,
) -> ResultRow {
    ResultRow {
        key: ResultKey {
            terminal: terminal.to_string(),
            variable: variable.to_string(),
            study_case: study_case.to_string(),
            contingency: contingency.to_string(),
            filter_id: filter_id.to_string(),
            frequency_mhz: millihertz(frequency_hz),
            harmonic_order,
        },
        value,
        full_name: full_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn context() -> ExportContext {
        let terminals = vec![
            TerminalRef {
                name: "PCC".into(),
                locations: vec!["bus/PCC".into()],
                include_in_transfer_impedance: true,
            },
            TerminalRef {
                name: "WTG".into(),
                locations: vec!["bus/WTG".into()],
                include_in_transfer_impedance: false,
            },
        ];
        let pairs = hss_study::derive_mutual_pairs(&terminals);
        ExportContext::new(&terminals, &pairs, 50.0)
    }

    fn write_export(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const HARMONIC_EXPORT: &str = "\
# study_case=BASE
# contingency=Intact
# filter=-
scale:harmonic,bus/PCC|m:R,bus/PCC|e:uknom,PCC-WTG|m:Zm,bus/PCC|b:fnow
1,10.0,132.0,3.0,50.0
5,12.5,132.0,4.5,250.0
";

    #[test]
    fn harmonic_scale_is_corrected_to_hz() {
        let file = write_export(HARMONIC_EXPORT);
        let parsed = parse_export(file.path(), &context()).unwrap();
        assert!(parsed.harmonic_domain);
        let r_rows: Vec<_> = parsed
            .rows
            .iter()
            .filter(|r| r.key.variable == "m:R")
            .collect();
        assert_eq!(r_rows.len(), 2);
        assert_eq!(r_rows[0].key.frequency_hz(), 50.0);
        assert_eq!(r_rows[0].key.harmonic_order, Some(1));
        assert_eq!(r_rows[1].key.frequency_hz(), 250.0);
        assert_eq!(r_rows[1].key.harmonic_order, Some(5));
    }

    #[test]
    fn scale_metadata_columns_are_tagged_and_dropped() {
        let file = write_export(HARMONIC_EXPORT);
        let parsed = parse_export(file.path(), &context()).unwrap();
        assert_eq!(parsed.dropped_scale_columns, 1);
        assert!(parsed.rows.iter().all(|r| r.key.variable != SCALE_VARIABLE));
    }

    #[test]
    fn nominal_voltage_becomes_a_lookup_not_data() {
        let file = write_export(HARMONIC_EXPORT);
        let parsed = parse_export(file.path(), &context()).unwrap();
        assert_eq!(parsed.nominal_kv.get("PCC"), Some(&132.0));
        assert!(parsed
            .rows
            .iter()
            .all(|r| r.key.variable != NOMINAL_VOLTAGE_VARIABLE));
    }

    #[test]
    fn mutual_columns_are_mirrored_both_ways() {
        let file = write_export(HARMONIC_EXPORT);
        let parsed = parse_export(file.path(), &context()).unwrap();
        let forward: Vec<_> = parsed
            .rows
            .iter()
            .filter(|r| r.key.terminal == "PCC->WTG")
            .collect();
        let backward: Vec<_> = parsed
            .rows
            .iter()
            .filter(|r| r.key.terminal == "WTG->PCC")
            .collect();
        assert_eq!(forward.len(), 2);
        assert_eq!(backward.len(), 2);
        assert_eq!(forward[0].value, backward[0].value);
    }

    #[test]
    fn hz_scale_is_taken_verbatim() {
        let file = write_export(
            "# study_case=BASE\n# contingency=Intact\nscale:hz,bus/PCC|m:R\n123.4,9.0\n",
        );
        let parsed = parse_export(file.path(), &context()).unwrap();
        assert!(!parsed.harmonic_domain);
        assert_eq!(parsed.rows[0].key.frequency_hz(), 123.4);
        assert_eq!(parsed.rows[0].key.harmonic_order, None);
    }

    #[test]
    fn missing_metadata_is_an_error() {
        let file = write_export("scale:hz,bus/PCC|m:R\n50,1.0\n");
        assert!(parse_export(file.path(), &context()).is_err());
    }
}
