//! The merged multi-key result dataset.
//!
//! Conceptually a sparse table keyed by `(terminal_or_mutual_pair,
//! variable, study_case, contingency, filter_id, frequency)`. Frequencies
//! are keyed in integer millihertz so keys stay hashable and comparisons
//! stay exact.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use hss_core::Diagnostics;

/// Placeholder filter id for variants without a filter.
pub const NO_FILTER: &str = "-";

/// Unique key of one sample in the merged dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    /// Terminal logical name, or a directional mutual pair `A->B`.
    pub terminal: String,
    pub variable: String,
    pub study_case: String,
    pub contingency: String,
    pub filter_id: String,
    /// Frequency in integer millihertz.
    pub frequency_mhz: i64,
    /// Harmonic order when the export was harmonic-domain.
    pub harmonic_order: Option<u32>,
}

impl ResultKey {
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_mhz as f64 / 1000.0
    }

    pub fn with_frequency_hz(mut self, hz: f64) -> Self {
        self.frequency_mhz = millihertz(hz);
        self
    }
}

/// Convert Hz to the integer millihertz key representation.
pub fn millihertz(hz: f64) -> i64 {
    (hz * 1000.0).round() as i64
}

/// One sample row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub key: ResultKey,
    pub value: f64,
    /// Display name of the producing case, e.g. `BASE_Line_Out`. Renamed in
    /// step with `study_case` on collision.
    pub full_name: String,
}

impl ResultRow {
    /// Byte-for-byte row identity, used to collapse true repeats.
    pub fn is_identical(&self, other: &ResultRow) -> bool {
        self.key == other.key
            && self.full_name == other.full_name
            && self.value.to_bits() == other.value.to_bits()
    }
}

/// A `study_case -> study_case(n)` collision rename, reported once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameNote {
    pub original: String,
    pub renamed_to: String,
}

/// The merged, de-duplicated dataset handed to reporting.
#[derive(Debug, Default)]
pub struct MergedDataset {
    pub rows: Vec<ResultRow>,
    /// Variable names actually present, in precedence order (not sorted).
    pub variables: Vec<String>,
    /// Nominal voltage per terminal, attachable as an extra index level.
    pub nominal_kv: HashMap<String, f64>,
    pub renames: Vec<RenameNote>,
    /// Exports successfully merged out of those offered.
    pub merged_files: usize,
    pub expected_files: usize,
    pub diagnostics: Diagnostics,
}

impl MergedDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for one terminal (or directional mutual pair).
    pub fn rows_for_terminal<'a>(
        &'a self,
        terminal: &'a str,
    ) -> impl Iterator<Item = &'a ResultRow> {
        self.rows.iter().filter(move |r| r.key.terminal == terminal)
    }

    /// Write the dataset as CSV. The nominal-voltage level is optional so
    /// the flat layout stays available for older consumers.
    pub fn write_csv(&self, path: &Path, attach_voltage_level: bool) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating merged dataset '{}'", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);

        let mut header = vec!["terminal"];
        if attach_voltage_level {
            header.push("nominal_kv");
        }
        header.extend([
            "variable",
            "study_case",
            "contingency",
            "filter",
            "frequency_hz",
            "harmonic_order",
            "value",
            "full_name",
        ]);
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.key.terminal.clone()];
            if attach_voltage_level {
                let kv = self
                    .nominal_kv
                    .get(&row.key.terminal)
                    .map(|kv| format!("{kv}"))
                    .unwrap_or_default();
                record.push(kv);
            }
            record.extend([
                row.key.variable.clone(),
                row.key.study_case.clone(),
                row.key.contingency.clone(),
                row.key.filter_id.clone(),
                format!("{}", row.key.frequency_hz()),
                row.key
                    .harmonic_order
                    .map(|o| o.to_string())
                    .unwrap_or_default(),
                format!("{}", row.value),
                row.full_name.clone(),
            ]);
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .with_context(|| format!("writing merged dataset '{}'", path.display()))?;
        Ok(())
    }
}
