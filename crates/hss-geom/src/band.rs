//! Harmonic frequency bands.

use serde::{Deserialize, Serialize};

/// One harmonic band; bands need not be evenly spaced or contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub harmonic_order: u32,
    pub f_min_hz: f64,
    pub f_max_hz: f64,
}

impl FrequencyBand {
    /// Half-open on the upper edge so adjacent bands do not double-count.
    pub fn contains(&self, frequency_hz: f64) -> bool {
        frequency_hz >= self.f_min_hz && frequency_hz < self.f_max_hz
    }
}

/// Find the band a frequency falls into.
pub fn band_for(bands: &[FrequencyBand], frequency_hz: f64) -> Option<&FrequencyBand> {
    bands.iter().find(|b| b.contains(frequency_hz))
}

/// Bands of width one harmonic order centred on each order.
pub fn bands_for_orders(orders: &[u32], nominal_frequency_hz: f64) -> Vec<FrequencyBand> {
    orders
        .iter()
        .map(|&order| FrequencyBand {
            harmonic_order: order,
            f_min_hz: (order as f64 - 0.5) * nominal_frequency_hz,
            f_max_hz: (order as f64 + 0.5) * nominal_frequency_hz,
        })
        .collect()
}
