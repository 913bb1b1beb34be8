//! Typed settings groups for a study run.
//!
//! Each group corresponds to one stage of the pipeline and carries named
//! fields with defaults, constructed once from the parsed study document and
//! passed by reference thereafter.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Solver-facing settings shared by feasibility checks and frequency scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Highest harmonic order considered in scans and THD recomputation.
    #[serde(default = "default_max_harmonic_order")]
    pub max_harmonic_order: u32,
    /// Fundamental frequency used to convert harmonic-order scales to Hz.
    #[serde(default = "default_nominal_frequency")]
    pub nominal_frequency_hz: f64,
}

fn default_max_harmonic_order() -> u32 {
    40
}

fn default_nominal_frequency() -> f64 {
    50.0
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_harmonic_order: default_max_harmonic_order(),
            nominal_frequency_hz: default_nominal_frequency(),
        }
    }
}

/// Scheduling policy wrapped around the engine's execution facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Attempts per batch submission, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between retry attempts, in seconds.
    #[serde(default = "default_retry_delay_s")]
    pub retry_delay_s: u64,
    /// Maximum wait per remote call, in seconds. Exceeding it is treated as
    /// a transient error, not an immediate failure.
    #[serde(default = "default_call_timeout_s")]
    pub call_timeout_s: u64,
    /// Submit batches with the engine's parallel workers. Serial fallback
    /// still applies when parallel submission ultimately errors.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay_s() -> u64 {
    5
}

fn default_call_timeout_s() -> u64 {
    100
}

fn default_parallel() -> bool {
    true
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_s: default_retry_delay_s(),
            call_timeout_s: default_call_timeout_s(),
            parallel: default_parallel(),
        }
    }
}

impl ScheduleSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_secs(self.retry_delay_s),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_s)
    }
}

/// Result aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSettings {
    /// Variables to keep, in configuration precedence order. Empty keeps all.
    #[serde(default)]
    pub variable_whitelist: Vec<String>,
    /// Recompute THD from individual harmonic magnitudes instead of
    /// trusting values embedded in raw exports.
    #[serde(default = "default_true")]
    pub recompute_thd: bool,
    /// Attach each terminal's nominal voltage as an extra index level.
    #[serde(default = "default_true")]
    pub attach_voltage_level: bool,
    /// Highest harmonic order included in THD recomputation.
    #[serde(default = "default_max_harmonic_order")]
    pub max_harmonic_order: u32,
}

fn default_true() -> bool {
    true
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            variable_whitelist: Vec::new(),
            recompute_thd: default_true(),
            attach_voltage_level: default_true(),
            max_harmonic_order: default_max_harmonic_order(),
        }
    }
}

/// Impedance-locus boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySettings {
    /// Vertex cap for simplified boundary polygons (floor of 4 applies).
    #[serde(default = "default_max_vertices")]
    pub max_vertices: usize,
    /// Fraction of points, ranked by centroid distance, excluded per band
    /// before hull computation. 0.0 disables exclusion.
    #[serde(default)]
    pub exclude_fraction: f64,
}

fn default_max_vertices() -> usize {
    12
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            max_vertices: default_max_vertices(),
            exclude_fraction: 0.0,
        }
    }
}

/// All settings groups for one study run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudySettings {
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub aggregate: AggregateSettings,
    #[serde(default)]
    pub boundary: BoundarySettings,
}
