//! Metric specification grammar
//!
//! Supported strings:
//! - `alpha:Pz`                  (shorthand band power)
//! - `alpha/beta:Pz`             (shorthand ratio)
//! - `band:alpha:Pz`
//! - `ratio:alpha:beta:Pz`
//! - `asym:alpha:F4:F3`          (log10 power asymmetry)
//! - `coh:alpha:F3:F4`           (magnitude-squared coherence)
//! - `coh:imcoh:alpha:F3:F4`     (explicit measure)
//! - `msc:alpha:F3:F4` / `imcoh:alpha:F3:F4`
//! - `pac:theta:gamma:Cz`        (Tort MI)
//! - `mvl:theta:gamma:Cz`        (mean vector length)
//!
//! Band tokens are matched case-insensitively against the active band
//! list; explicit ranges `LO-HI` are accepted anywhere a band name is.

use std::collections::VecDeque;

use qeeg_connect::{CoherenceMeasure, PacMethod};
use qeeg_core::{QeegError, QeegResult};

/// A parsed metric specification.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MetricSpec {
    Band {
        band: String,
        channel: String,
    },
    Ratio {
        band_num: String,
        band_den: String,
        channel: String,
    },
    Asymmetry {
        band: String,
        channel_a: String,
        channel_b: String,
    },
    Coherence {
        measure: CoherenceMeasure,
        band: String,
        channel_a: String,
        channel_b: String,
    },
    Pac {
        method: PacMethod,
        phase_band: String,
        amp_band: String,
        channel: String,
    },
}

fn expect_parts(parts: &[&str], n: usize, usage: &str) -> QeegResult<()> {
    if parts.len() != n {
        return Err(QeegError::invalid_param(format!("metric spec: expected {usage}")));
    }
    Ok(())
}

impl MetricSpec {
    pub fn parse(s: &str) -> QeegResult<Self> {
        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        if parts.is_empty() || parts[0].is_empty() {
            return Err(QeegError::invalid_param("metric spec: empty"));
        }

        let head = parts[0].to_lowercase();
        match head.as_str() {
            "band" => {
                expect_parts(&parts, 3, "band:NAME:CHANNEL")?;
                return Ok(Self::Band {
                    band: parts[1].to_string(),
                    channel: parts[2].to_string(),
                });
            }
            "ratio" => {
                expect_parts(&parts, 4, "ratio:NUM:DEN:CHANNEL")?;
                return Ok(Self::Ratio {
                    band_num: parts[1].to_string(),
                    band_den: parts[2].to_string(),
                    channel: parts[3].to_string(),
                });
            }
            "asym" | "asymmetry" => {
                expect_parts(&parts, 4, "asym:BAND:CH_A:CH_B")?;
                return Ok(Self::Asymmetry {
                    band: parts[1].to_string(),
                    channel_a: parts[2].to_string(),
                    channel_b: parts[3].to_string(),
                });
            }
            "coh" | "coherence" => {
                if parts.len() == 5 {
                    return Ok(Self::Coherence {
                        measure: CoherenceMeasure::parse(parts[1])?,
                        band: parts[2].to_string(),
                        channel_a: parts[3].to_string(),
                        channel_b: parts[4].to_string(),
                    });
                }
                expect_parts(&parts, 4, "coh:BAND:CH_A:CH_B or coh:MEASURE:BAND:CH_A:CH_B")?;
                return Ok(Self::Coherence {
                    measure: CoherenceMeasure::MagnitudeSquared,
                    band: parts[1].to_string(),
                    channel_a: parts[2].to_string(),
                    channel_b: parts[3].to_string(),
                });
            }
            "msc" | "imcoh" | "absimag" => {
                expect_parts(&parts, 4, "MEASURE:BAND:CH_A:CH_B")?;
                return Ok(Self::Coherence {
                    measure: CoherenceMeasure::parse(&head)?,
                    band: parts[1].to_string(),
                    channel_a: parts[2].to_string(),
                    channel_b: parts[3].to_string(),
                });
            }
            "pac" | "pacmi" => {
                expect_parts(&parts, 4, "pac:PHASE:AMP:CHANNEL")?;
                return Ok(Self::Pac {
                    method: PacMethod::ModulationIndex,
                    phase_band: parts[1].to_string(),
                    amp_band: parts[2].to_string(),
                    channel: parts[3].to_string(),
                });
            }
            "mvl" | "pacmvl" => {
                expect_parts(&parts, 4, "mvl:PHASE:AMP:CHANNEL")?;
                return Ok(Self::Pac {
                    method: PacMethod::MeanVectorLength,
                    phase_band: parts[1].to_string(),
                    amp_band: parts[2].to_string(),
                    channel: parts[3].to_string(),
                });
            }
            _ => {}
        }

        // Shorthand: NAME:CH or NUM/DEN:CH.
        if parts.len() != 2 {
            return Err(QeegError::invalid_param(
                "metric spec: expected 'alpha:Pz', 'alpha/beta:Pz', 'asym:alpha:F4:F3', \
                 'coh:alpha:F3:F4', 'imcoh:alpha:F3:F4', or 'pac:theta:gamma:Cz'",
            ));
        }
        let channel = parts[1].to_string();
        match parts[0].split_once('/') {
            None => Ok(Self::Band {
                band: parts[0].to_string(),
                channel,
            }),
            Some((num, den)) => Ok(Self::Ratio {
                band_num: num.trim().to_string(),
                band_den: den.trim().to_string(),
                channel,
            }),
        }
    }
}

/// Moving-average smoothing of the metric stream.
///
/// Averages the most recent `window_frames` finite values; NaN inputs pass
/// through without touching the window so a transient numerical failure
/// does not poison later frames.
#[derive(Debug, Clone)]
pub struct MetricSmoother {
    window_frames: usize,
    values: VecDeque<f64>,
}

impl MetricSmoother {
    /// `smooth_seconds <= 0` (or a window of one frame) disables
    /// smoothing.
    pub fn new(smooth_seconds: f64, update_seconds: f64) -> Self {
        let window_frames = if smooth_seconds > 0.0 && update_seconds > 0.0 {
            (smooth_seconds / update_seconds).round().max(1.0) as usize
        } else {
            1
        };
        Self {
            window_frames,
            values: VecDeque::new(),
        }
    }

    pub fn window_frames(&self) -> usize {
        self.window_frames
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    pub fn smooth(&mut self, value: f64) -> f64 {
        if self.window_frames <= 1 {
            return value;
        }
        if !value.is_finite() {
            return value;
        }
        self.values.push_back(value);
        while self.values.len() > self.window_frames {
            self.values.pop_front();
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}
