//! Per-terminal, per-band locus boundaries and the boundary table writer.

use anyhow::{Context, Result};
use hss_core::settings::BoundarySettings;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::band::{band_for, FrequencyBand};
use crate::locus::{boundary, Point};

/// One network impedance sample: Z(f) at a terminal, split into R and X.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpedanceSample {
    pub terminal: String,
    pub frequency_hz: f64,
    pub resistance_ohm: f64,
    pub reactance_ohm: f64,
}

/// Closed boundary polygon for one (terminal, band) group.
#[derive(Debug, Clone, PartialEq)]
pub struct LocusBoundary {
    pub terminal: String,
    pub band: FrequencyBand,
    pub sample_count: usize,
    /// Closed polygon, first vertex repeated at the end. Empty when the
    /// group had no samples after exclusion.
    pub vertices: Vec<Point>,
}

/// Group samples by (terminal, band) and compute each group's boundary.
///
/// Samples outside every band are ignored. Output is ordered by terminal
/// name then band order, independent of input order.
pub fn compute_loci(
    samples: &[ImpedanceSample],
    bands: &[FrequencyBand],
    settings: &BoundarySettings,
) -> Vec<LocusBoundary> {
    let mut groups: BTreeMap<(String, u32), Vec<Point>> = BTreeMap::new();
    let mut band_by_order: BTreeMap<u32, FrequencyBand> = BTreeMap::new();
    for band in bands {
        band_by_order.insert(band.harmonic_order, *band);
    }
    for sample in samples {
        let Some(band) = band_for(bands, sample.frequency_hz) else {
            continue;
        };
        groups
            .entry((sample.terminal.clone(), band.harmonic_order))
            .or_default()
            .push((sample.resistance_ohm, sample.reactance_ohm));
    }

    let mut loci = Vec::with_capacity(groups.len());
    for ((terminal, order), points) in groups {
        let vertices = boundary(&points, settings.max_vertices, settings.exclude_fraction);
        debug!(
            terminal = %terminal,
            harmonic_order = order,
            samples = points.len(),
            vertices = vertices.len().saturating_sub(1),
            "computed locus boundary"
        );
        loci.push(LocusBoundary {
            terminal,
            band: band_by_order[&order],
            sample_count: points.len(),
            vertices,
        });
    }
    loci
}

/// Write the boundary table CSV: one row per polygon vertex, in polygon
/// order, closing vertex included.
pub fn write_boundary_table(path: &Path, loci: &[LocusBoundary]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating boundary table directory '{}'", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating boundary table '{}'", path.display()))?;
    writer
        .write_record([
            "terminal",
            "harmonic_order",
            "f_min_hz",
            "f_max_hz",
            "samples",
            "vertex",
            "r_ohm",
            "x_ohm",
        ])
        .context("writing boundary table header")?;
    for locus in loci {
        for (index, (r, x)) in locus.vertices.iter().enumerate() {
            writer
                .write_record([
                    locus.terminal.as_str(),
                    &locus.band.harmonic_order.to_string(),
                    &locus.band.f_min_hz.to_string(),
                    &locus.band.f_max_hz.to_string(),
                    &locus.sample_count.to_string(),
                    &index.to_string(),
                    &r.to_string(),
                    &x.to_string(),
                ])
                .with_context(|| {
                    format!("writing boundary row for terminal '{}'", locus.terminal)
                })?;
        }
    }
    writer.flush().context("flushing boundary table")?;
    Ok(())
}
