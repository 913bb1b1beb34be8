//! Study document loading and resolution.
//!
//! The study document is a YAML or JSON file listing base cases,
//! contingencies, filter sweeps, terminals and settings. Resolution
//! validates the document once and produces the typed records the rest of
//! the pipeline works with; nothing downstream ever sees raw document rows.
//!
//! Per-item problems (duplicate names, malformed rows) skip the offending
//! item and are collected as diagnostics; only a document with no usable
//! base case is rejected outright.

use anyhow::{anyhow, Context, Result};
use hss_core::{Diagnostics, StudySettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::case::{BaseCase, Contingency, ElementAction, FilterTap, FilterVariant, INTACT_NAME};
use crate::terminals::{derive_mutual_pairs, MutualPairRef, TerminalRef};

/// Top-level study document as written by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySet {
    pub version: Option<u32>,
    pub name: Option<String>,
    #[serde(default)]
    pub defaults: StudyDefaults,
    #[serde(default)]
    pub base_cases: Vec<BaseCaseSpec>,
    #[serde(default)]
    pub contingencies: Vec<ContingencySpec>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub terminals: Vec<TerminalRef>,
    #[serde(default)]
    pub settings: StudySettings,
}

/// Defaults applied to base cases that omit per-case configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyDefaults {
    pub load_flow_config: Option<String>,
    pub scan_config: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCaseSpec {
    pub name: String,
    pub network_reference: String,
    pub load_flow_config: Option<String>,
    pub scan_config: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContingencySpec {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ElementAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    pub target_element: String,
    #[serde(default = "default_include")]
    pub include: bool,
    #[serde(default)]
    pub tuning_frequencies_hz: Vec<f64>,
    #[serde(default)]
    pub sizes_mvar: Vec<f64>,
}

fn default_include() -> bool {
    true
}

/// Fully validated study inputs.
#[derive(Debug, Clone)]
pub struct ResolvedStudy {
    pub name: String,
    pub base_cases: Vec<BaseCase>,
    /// Explicit contingencies only; "Intact" is implicit and always applied.
    pub contingencies: Vec<Contingency>,
    /// Enabled filters with a non-empty tap grid.
    pub filters: Vec<FilterVariant>,
    pub terminals: Vec<TerminalRef>,
    pub mutual_pairs: Vec<MutualPairRef>,
    pub settings: StudySettings,
    pub diagnostics: Diagnostics,
}

/// Load a study document, sniffing YAML vs JSON from the extension.
pub fn load_study_from_path(path: &Path) -> Result<StudySet> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading study document '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing study document yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing study document json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing study document"),
    }
}

/// Validate a study document and produce typed records.
///
/// Per-item problems skip the item and land in the returned diagnostics;
/// a document that resolves to zero base cases is an error.
pub fn resolve_study(set: &StudySet) -> Result<ResolvedStudy> {
    let mut diagnostics = Diagnostics::new();

    let mut base_cases = Vec::with_capacity(set.base_cases.len());
    let mut seen = HashSet::new();
    for spec in &set.base_cases {
        if spec.name.trim().is_empty() {
            diagnostics.add_error("config", "base case with empty name skipped");
            continue;
        }
        if !seen.insert(spec.name.clone()) {
            diagnostics.add_error_with_entity("config", "duplicate base case name", &spec.name);
            continue;
        }
        base_cases.push(BaseCase {
            name: spec.name.clone(),
            network_reference: spec.network_reference.clone(),
            load_flow_config: spec
                .load_flow_config
                .clone()
                .or_else(|| set.defaults.load_flow_config.clone()),
            scan_config: spec
                .scan_config
                .clone()
                .or_else(|| set.defaults.scan_config.clone()),
        });
    }
    if base_cases.is_empty() {
        return Err(anyhow!("study document contains no usable base cases"));
    }

    let mut contingencies = Vec::with_capacity(set.contingencies.len());
    let mut seen = HashSet::new();
    for spec in &set.contingencies {
        if spec.name.trim().is_empty() {
            diagnostics.add_error("config", "contingency with empty name skipped");
            continue;
        }
        if spec.name == INTACT_NAME {
            if spec.actions.is_empty() {
                // Implicit anyway; tolerate the redundant row.
                continue;
            }
            diagnostics.add_error_with_entity(
                "config",
                "the reserved contingency name carries actions; row skipped",
                INTACT_NAME,
            );
            continue;
        }
        if !seen.insert(spec.name.clone()) {
            diagnostics.add_error_with_entity("config", "duplicate contingency name", &spec.name);
            continue;
        }
        if spec.actions.is_empty() {
            diagnostics.add_warning_with_entity(
                "config",
                "contingency declares no actions; skipped",
                &spec.name,
            );
            continue;
        }
        contingencies.push(Contingency {
            name: spec.name.clone(),
            actions: spec.actions.clone(),
        });
    }

    let mut filters = Vec::new();
    let mut seen = HashSet::new();
    for spec in &set.filters {
        if !spec.include {
            continue;
        }
        if !seen.insert(spec.name.clone()) {
            diagnostics.add_error_with_entity("config", "duplicate filter name", &spec.name);
            continue;
        }
        let taps = filter_taps(spec);
        if taps.is_empty() {
            diagnostics.add_warning_with_entity(
                "config",
                "filter has an empty (frequency, size) grid; skipped",
                &spec.name,
            );
            continue;
        }
        filters.push(FilterVariant {
            name: spec.name.clone(),
            target_element: spec.target_element.clone(),
            taps,
        });
    }

    let mut terminals = Vec::with_capacity(set.terminals.len());
    let mut seen = HashSet::new();
    for terminal in &set.terminals {
        if !seen.insert(terminal.name.clone()) {
            diagnostics.add_error_with_entity("config", "duplicate terminal name", &terminal.name);
            continue;
        }
        terminals.push(terminal.clone());
    }
    let mutual_pairs = derive_mutual_pairs(&terminals);
    for pair in mutual_pairs.iter().filter(|p| p.was_trimmed()) {
        diagnostics.add_info(
            "config",
            &format!(
                "mutual pair name '{}' trimmed to '{}'",
                pair.planned_name, pair.used_name
            ),
        );
    }

    if diagnostics.has_errors() {
        warn!("study resolution finished with {}", diagnostics.summary());
    }

    Ok(ResolvedStudy {
        name: set.name.clone().unwrap_or_else(|| "study".to_string()),
        base_cases,
        contingencies,
        filters,
        terminals,
        mutual_pairs,
        settings: set.settings.clone(),
        diagnostics,
    })
}

/// Cartesian (frequency, size) grid for one filter.
fn filter_taps(spec: &FilterSpec) -> Vec<FilterTap> {
    let mut taps = Vec::with_capacity(spec.tuning_frequencies_hz.len() * spec.sizes_mvar.len());
    for &frequency in &spec.tuning_frequencies_hz {
        for &size in &spec.sizes_mvar {
            taps.push(FilterTap {
                tuning_frequency_hz: frequency,
                size_mvar: size,
            });
        }
    }
    taps
}
