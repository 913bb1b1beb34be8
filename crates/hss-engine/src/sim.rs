//! Deterministic simulated engine.
//!
//! Stands in for the external solver during tests and demo runs: it honours
//! the one-active-case rule, classifies scripted feasibility codes, and
//! writes synthetic-but-deterministic raw exports in the engine CSV format
//! (leading `# key=value` metadata lines, a scale column, then
//! `location|variable` columns). Values are a pure function of case id,
//! location and harmonic order, so repeated runs produce byte-identical
//! exports.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use hss_study::CaseVariant;

use crate::engine::{CaseScanRecord, EngineError, SolverEngine, StatusCode};

/// One measurement location the simulated engine reports on.
#[derive(Debug, Clone)]
pub struct SimTerminal {
    pub name: String,
    pub location: String,
    pub nominal_kv: f64,
}

/// Scripted, deterministic engine implementation.
pub struct SimEngine {
    export_root: PathBuf,
    terminals: Vec<SimTerminal>,
    /// Mutual measurement locations (pair used-names).
    mutual_locations: Vec<String>,
    harmonic_orders: Vec<u32>,
    feasibility_codes: HashMap<String, StatusCode>,
    missing_elements: HashSet<String>,
    active: Mutex<Option<String>>,
    threads: usize,
}

impl SimEngine {
    pub fn new(export_root: impl Into<PathBuf>) -> Self {
        Self {
            export_root: export_root.into(),
            terminals: Vec::new(),
            mutual_locations: Vec::new(),
            harmonic_orders: vec![1, 5, 7, 11, 13],
            feasibility_codes: HashMap::new(),
            missing_elements: HashSet::new(),
            active: Mutex::new(None),
            threads: 0,
        }
    }

    pub fn with_terminal(
        mut self,
        name: impl Into<String>,
        location: impl Into<String>,
        nominal_kv: f64,
    ) -> Self {
        self.terminals.push(SimTerminal {
            name: name.into(),
            location: location.into(),
            nominal_kv,
        });
        self
    }

    pub fn with_mutual_location(mut self, used_name: impl Into<String>) -> Self {
        self.mutual_locations.push(used_name.into());
        self
    }

    pub fn with_harmonic_orders(mut self, orders: Vec<u32>) -> Self {
        self.harmonic_orders = orders;
        self
    }

    /// Script a feasibility code for one variant id; unknown ids converge.
    pub fn with_feasibility_code(mut self, variant_id: impl Into<String>, code: StatusCode) -> Self {
        self.feasibility_codes.insert(variant_id.into(), code);
        self
    }

    /// Script an element that does not resolve against any network.
    pub fn with_missing_element(mut self, element: impl Into<String>) -> Self {
        self.missing_elements.insert(element.into());
        self
    }

    fn export_path(&self, variant: &CaseVariant) -> PathBuf {
        self.export_root
            .join(sanitize(&variant.base_case))
            .join(format!("{}.csv", sanitize(&variant.id)))
    }

    fn write_export(&self, variant: &CaseVariant) -> Result<PathBuf, EngineError> {
        let path = self.export_path(variant);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::new(5, format!("creating export dir: {e}")))?;
        }

        let mut lines = Vec::new();
        lines.push(format!("# study_case={}", variant.base_case));
        lines.push(format!("# contingency={}", variant.contingency.name));
        lines.push(format!(
            "# filter={}",
            variant
                .filter
                .as_ref()
                .map(|f| f.label())
                .unwrap_or_else(|| "-".to_string())
        ));

        let mut header = vec!["scale:harmonic".to_string()];
        for terminal in &self.terminals {
            for variable in ["m:R", "m:X", "m:Uharm", "m:THD", "e:uknom"] {
                header.push(format!("{}|{}", terminal.location, variable));
            }
        }
        for location in &self.mutual_locations {
            header.push(format!("{}|m:Zm", location));
        }
        lines.push(header.join(","));

        for &order in &self.harmonic_orders {
            let mut row = vec![format!("{order}")];
            for terminal in &self.terminals {
                row.push(fmt(sample(&variant.id, &terminal.location, "m:R", order)));
                row.push(fmt(sample(&variant.id, &terminal.location, "m:X", order)));
                row.push(fmt(if order == 1 {
                    100.0
                } else {
                    sample(&variant.id, &terminal.location, "m:Uharm", order)
                }));
                // Embedded THD is deliberately junk; the aggregator recomputes it.
                row.push(fmt(9.99));
                row.push(fmt(terminal.nominal_kv));
            }
            for location in &self.mutual_locations {
                row.push(fmt(sample(&variant.id, location, "m:Zm", order)));
            }
            lines.push(row.join(","));
        }

        fs::write(&path, lines.join("\n") + "\n")
            .map_err(|e| EngineError::new(5, format!("writing export: {e}")))?;
        debug!(case = %variant.id, path = %path.display(), "wrote simulated export");
        Ok(path)
    }
}

impl SolverEngine for SimEngine {
    fn activate(&self, case_id: &str) -> Result<(), EngineError> {
        let mut active = self.active.lock().unwrap();
        match active.as_deref() {
            Some(current) if current != case_id => Err(EngineError::new(
                8,
                format!("case '{current}' is already active"),
            )),
            _ => {
                *active = Some(case_id.to_string());
                Ok(())
            }
        }
    }

    fn deactivate(&self, case_id: &str) -> Result<(), EngineError> {
        let mut active = self.active.lock().unwrap();
        match active.as_deref() {
            Some(current) if current == case_id => {
                *active = None;
                Ok(())
            }
            _ => Err(EngineError::new(8, format!("case '{case_id}' is not active"))),
        }
    }

    fn can_resolve(&self, _network_reference: &str, element: &str) -> bool {
        !self.missing_elements.contains(element)
    }

    fn run_feasibility(&self, variant: &CaseVariant) -> Result<StatusCode, EngineError> {
        Ok(*self.feasibility_codes.get(&variant.id).unwrap_or(&0))
    }

    fn run_scan(&self, variant: &CaseVariant) -> Result<PathBuf, EngineError> {
        self.write_export(variant)
    }

    fn submit_batch(
        &self,
        variants: &[CaseVariant],
        parallel: bool,
        _timeout: Duration,
    ) -> Result<Vec<CaseScanRecord>, EngineError> {
        let run = |variant: &CaseVariant| -> CaseScanRecord {
            match self.write_export(variant) {
                Ok(path) => CaseScanRecord {
                    case_id: variant.id.clone(),
                    export: Some(path),
                    error: None,
                },
                Err(err) => CaseScanRecord {
                    case_id: variant.id.clone(),
                    export: None,
                    error: Some(err.to_string()),
                },
            }
        };

        if parallel {
            let thread_count = if self.threads == 0 {
                num_cpus::get()
            } else {
                self.threads
            };
            let pool = ThreadPoolBuilder::new()
                .num_threads(thread_count)
                .build()
                .map_err(|e| EngineError::new(5, format!("building scan pool: {e}")))?;
            Ok(pool.install(|| variants.par_iter().map(run).collect()))
        } else {
            Ok(variants.iter().map(run).collect())
        }
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

fn fmt(value: f64) -> String {
    format!("{value:.4}")
}

/// Deterministic pseudo-sample in a plausible range for the variable kind.
fn sample(case_id: &str, location: &str, variable: &str, order: u32) -> f64 {
    let unit = hash01(&format!("{case_id}:{location}:{variable}:{order}"));
    match variable {
        "m:R" => 1.0 + 40.0 * unit + 0.2 * order as f64,
        "m:X" => -20.0 + 60.0 * unit + 0.1 * order as f64,
        "m:Uharm" => 5.0 * unit,
        _ => 100.0 * unit,
    }
}

/// FNV-1a folded into [0, 1).
fn hash01(input: &str) -> f64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x1000_0000_01b3);
    }
    (hash % 1_000_000) as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use hss_study::{BaseCase, Contingency};

    fn variant() -> CaseVariant {
        let base = BaseCase {
            name: "BASE".into(),
            network_reference: "grid".into(),
            load_flow_config: None,
            scan_config: None,
        };
        CaseVariant::new(&base, Contingency::intact(), None)
    }

    #[test]
    fn exports_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SimEngine::new(dir.path()).with_terminal("PCC", "bus/PCC", 132.0);
        let first = engine.run_scan(&variant()).unwrap();
        let contents_a = fs::read_to_string(&first).unwrap();
        let second = engine.run_scan(&variant()).unwrap();
        let contents_b = fs::read_to_string(&second).unwrap();
        assert_eq!(first, second);
        assert_eq!(contents_a, contents_b);
        assert!(contents_a.starts_with("# study_case=BASE"));
        assert!(contents_a.contains("bus/PCC|m:R"));
    }

    #[test]
    fn one_active_case_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SimEngine::new(dir.path());
        engine.activate("A").unwrap();
        assert!(engine.activate("B").is_err());
        engine.deactivate("A").unwrap();
        engine.activate("B").unwrap();
    }

    #[test]
    fn parallel_batch_writes_every_export() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SimEngine::new(dir.path()).with_terminal("PCC", "bus/PCC", 132.0);
        let base = BaseCase {
            name: "BASE".into(),
            network_reference: "grid".into(),
            load_flow_config: None,
            scan_config: None,
        };
        let variants: Vec<CaseVariant> = (0..4)
            .map(|i| {
                CaseVariant::new(
                    &base,
                    Contingency {
                        name: format!("C{i}"),
                        actions: Vec::new(),
                    },
                    None,
                )
            })
            .collect();
        let records = engine
            .submit_batch(&variants, true, Duration::from_secs(1))
            .unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.export.as_ref().unwrap().exists()));
    }

    #[test]
    fn scripted_feasibility_codes_apply() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SimEngine::new(dir.path()).with_feasibility_code("BASE_Intact", 1);
        assert_eq!(engine.run_feasibility(&variant()).unwrap(), 1);
    }
}
