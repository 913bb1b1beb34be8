//! Run manifest: one JSON artifact summarising a study run.
//!
//! Written next to the outputs so outer tooling can discover what a run
//! produced, which batches failed, and where the merged dataset and
//! boundary table landed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::Path;
use uuid::Uuid;

/// Per-batch summary carried on the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifestRecord {
    pub base_case: String,
    /// "ok" or "failed".
    pub status: String,
    pub attempts: u32,
    pub serial_fallback: bool,
    pub error: Option<String>,
    pub cases: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub study: String,
    pub variants_expanded: usize,
    pub convergent: usize,
    pub non_convergent: usize,
    pub skipped: usize,
    pub batches: Vec<BatchManifestRecord>,
    pub exports_expected: usize,
    pub exports_merged: usize,
    pub merged_output: Option<String>,
    pub boundary_output: Option<String>,
}

impl RunManifest {
    pub fn new(study: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            study: study.into(),
            variants_expanded: 0,
            convergent: 0,
            non_convergent: 0,
            skipped: 0,
            batches: Vec::new(),
            exports_expected: 0,
            exports_merged: 0,
            merged_output: None,
            boundary_output: None,
        }
    }
}

pub fn write_run_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(manifest).context("serializing run manifest to JSON")?;
    fs::write(path, json).with_context(|| format!("writing run manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_run_manifest(path: &Path) -> Result<RunManifest> {
    let file = File::open(path)
        .with_context(|| format!("opening run manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing run manifest '{}'", path.display()))
}
