//! # hss-results: export parsing and multi-run aggregation
//!
//! Consumes the raw per-case exports the engine produces, merges any number
//! of them into one keyed, de-duplicated dataset with collision renaming
//! and recomputed THD, and writes the merged CSV plus the run manifest.

pub mod aggregate;
pub mod dataset;
pub mod export;
pub mod manifest;

pub use aggregate::aggregate;
pub use dataset::{millihertz, MergedDataset, RenameNote, ResultKey, ResultRow, NO_FILTER};
pub use export::{
    parse_export, ExportContext, ParsedExport, NOMINAL_VOLTAGE_VARIABLE, SCALE_VARIABLE,
    THD_SOURCE_VARIABLE, THD_VARIABLE,
};
pub use manifest::{
    load_run_manifest, write_run_manifest, BatchManifestRecord, RunManifest,
};
