//! # hss-geom: impedance-locus boundary geometry
//!
//! Turns per-band network impedance scatter into compact convex boundary
//! polygons: harmonic frequency bands, convex hull with outlier exclusion
//! and vertex capping, and the boundary-table CSV writer.

pub mod band;
pub mod loci;
pub mod locus;

pub use band::{band_for, bands_for_orders, FrequencyBand};
pub use loci::{compute_loci, write_boundary_table, ImpedanceSample, LocusBoundary};
pub use locus::{boundary, polygon_area, Point, MIN_VERTICES};
