//! Band power integration and normalization

use crate::welch::PsdResult;
use qeeg_core::{QeegError, QeegResult};

/// Integrate the PSD between `[fmin_hz, fmax_hz]` using the trapezoid rule.
///
/// PSD values at the band boundaries are linearly interpolated, so bands
/// need not align with the frequency grid.
pub fn integrate_bandpower(psd: &PsdResult, fmin_hz: f64, fmax_hz: f64) -> QeegResult<f64> {
    if psd.freqs_hz.len() != psd.psd.len() || psd.freqs_hz.len() < 2 {
        return Err(QeegError::invalid_param("integrate_bandpower: invalid psd input"));
    }
    if !(fmax_hz > fmin_hz) {
        return Err(QeegError::invalid_param("integrate_bandpower: fmax must be > fmin"));
    }

    let lerp = |x0: f64, y0: f64, x1: f64, y1: f64, x: f64| -> f64 {
        if x1 == x0 {
            y0
        } else {
            y0 + (x - x0) / (x1 - x0) * (y1 - y0)
        }
    };

    let mut area = 0.0;
    for i in 0..psd.freqs_hz.len() - 1 {
        let f0 = psd.freqs_hz[i];
        let f1 = psd.freqs_hz[i + 1];
        let p0 = psd.psd[i];
        let p1 = psd.psd[i + 1];

        let a = f0.max(fmin_hz);
        let b = f1.min(fmax_hz);
        if b <= a {
            continue;
        }

        let pa = lerp(f0, p0, f1, p1, a);
        let pb = lerp(f0, p0, f1, p1, b);
        area += 0.5 * (pa + pb) * (b - a);
    }
    Ok(area)
}

/// Band power relative to an enclosing total band.
///
/// Returns 0 when the total-band power is not positive.
pub fn relative_bandpower(
    psd: &PsdResult,
    fmin_hz: f64,
    fmax_hz: f64,
    total_fmin_hz: f64,
    total_fmax_hz: f64,
) -> QeegResult<f64> {
    let band = integrate_bandpower(psd, fmin_hz, fmax_hz)?;
    let total = integrate_bandpower(psd, total_fmin_hz, total_fmax_hz)?;
    if total <= 0.0 {
        return Ok(0.0);
    }
    Ok(band / total)
}

/// Baseline normalization modes for event-related band power.
///
/// Given epoch power `E` and baseline power `B`:
/// - `Ratio`:          `E / B`
/// - `RelativeChange`: `(E - B) / B`
/// - `Log10Ratio`:     `log10(E / B)`
/// - `Decibel`:        `10 * log10(E / B)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BaselineNormMode {
    Ratio,
    RelativeChange,
    Log10Ratio,
    Decibel,
}

impl BaselineNormMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ratio => "ratio",
            Self::RelativeChange => "rel",
            Self::Log10Ratio => "logratio",
            Self::Decibel => "db",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ratio" | "r" => Some(Self::Ratio),
            "rel" | "relative" | "relative_change" | "relchange" => Some(Self::RelativeChange),
            "logratio" | "log" | "log10" | "log10ratio" => Some(Self::Log10Ratio),
            "db" | "decibel" => Some(Self::Decibel),
            _ => None,
        }
    }
}

/// Normalize `epoch_power` against `baseline_power`.
///
/// Returns NaN when the transform is not numerically well-defined
/// (non-finite inputs, `baseline_power <= 0`, or a log of a non-positive
/// epoch).
pub fn baseline_normalize(epoch_power: f64, baseline_power: f64, mode: BaselineNormMode) -> f64 {
    if !epoch_power.is_finite() || !baseline_power.is_finite() || baseline_power <= 0.0 {
        return f64::NAN;
    }
    match mode {
        BaselineNormMode::Ratio => epoch_power / baseline_power,
        BaselineNormMode::RelativeChange => (epoch_power - baseline_power) / baseline_power,
        BaselineNormMode::Log10Ratio => {
            if epoch_power <= 0.0 {
                f64::NAN
            } else {
                (epoch_power / baseline_power).log10()
            }
        }
        BaselineNormMode::Decibel => {
            if epoch_power <= 0.0 {
                f64::NAN
            } else {
                10.0 * (epoch_power / baseline_power).log10()
            }
        }
    }
}
