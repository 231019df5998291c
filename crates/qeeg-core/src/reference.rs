//! Normative reference statistics for z-scored band power

use std::collections::HashMap;

/// Per-(band, channel) normative mean/std table.
///
/// Populated by collaborators (e.g. from a reference CSV); keys collapse
/// case. Rows with non-positive std are rejected at insert so lookups never
/// divide by zero.
#[derive(Debug, Clone, Default)]
pub struct ReferenceStats {
    mean: HashMap<String, f64>,
    stdev: HashMap<String, f64>,
}

fn key(band: &str, channel: &str) -> String {
    format!(
        "{}|{}",
        band.trim().to_lowercase(),
        channel.trim().to_lowercase()
    )
}

impl ReferenceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one normative row. Returns false (and stores nothing) when
    /// `stdev <= 0` or either value is non-finite.
    pub fn insert(&mut self, channel: &str, band: &str, mean: f64, stdev: f64) -> bool {
        if !mean.is_finite() || !stdev.is_finite() || stdev <= 0.0 {
            log::warn!(
                "reference row rejected for {band}/{channel}: mean={mean}, std={stdev}"
            );
            return false;
        }
        let k = key(band, channel);
        self.mean.insert(k.clone(), mean);
        self.stdev.insert(k, stdev);
        true
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Z-score `value` against the stored reference for (channel, band);
    /// `None` when no reference row exists.
    pub fn zscore(&self, channel: &str, band: &str, value: f64) -> Option<f64> {
        let k = key(band, channel);
        let mean = *self.mean.get(&k)?;
        let stdev = *self.stdev.get(&k)?;
        Some((value - mean) / stdev)
    }
}
