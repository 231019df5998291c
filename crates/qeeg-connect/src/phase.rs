//! Phase-based connectivity measures
//!
//! All measures are computed from a narrow-band analytic signal per channel:
//! bandpass -> Hilbert -> complex z(t), with an edge trim to discard filter
//! transients.
//!
//! - PLV is sensitive to zero-lag coupling (which can be inflated by field
//!   spread / volume conduction).
//! - PLI/wPLI are based on the sign / magnitude of the imaginary component
//!   of the cross-spectrum, which suppresses purely zero-lag interactions.

use rustfft::num_complex::Complex;

use qeeg_core::{BandDefinition, QeegError, QeegResult, Sample};
use qeeg_dsp::{analytic_signal, bandpass_filter_band, edge_trim_samples};

const EPS: f64 = 1e-20;

/// The measure computed from the per-sample analytic cross product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PhaseMeasure {
    Plv,
    Pli,
    WeightedPli,
    WeightedPli2Debiased,
}

impl PhaseMeasure {
    pub fn name(self) -> &'static str {
        match self {
            Self::Plv => "plv",
            Self::Pli => "pli",
            Self::WeightedPli => "wpli",
            Self::WeightedPli2Debiased => "wpli2_debiased",
        }
    }

    pub fn parse(token: &str) -> QeegResult<Self> {
        match token.trim().to_lowercase().as_str() {
            "plv" => Ok(Self::Plv),
            "pli" => Ok(Self::Pli),
            "wpli" => Ok(Self::WeightedPli),
            "wpli2" | "wpli2_debiased" | "dwpli2" => Ok(Self::WeightedPli2Debiased),
            other => Err(QeegError::invalid_param(format!(
                "unknown phase measure: '{other}'"
            ))),
        }
    }

    /// Diagonal value of the pairwise matrix: 1 for PLV, 0 for the
    /// lag-based measures.
    pub fn self_coupling(self) -> f64 {
        match self {
            Self::Plv => 1.0,
            _ => 0.0,
        }
    }
}

/// Options shared by all phase measures.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseOptions {
    /// Forward-backward (zero-phase) filtering for the internal bandpass.
    /// Offline analyses keep this on; causal streaming turns it off.
    pub zero_phase: bool,
    /// Fraction of samples discarded at each edge after filtering and
    /// Hilbert transform. Must be in [0, 0.49].
    pub edge_trim_fraction: f64,
}

impl Default for PhaseOptions {
    fn default() -> Self {
        Self {
            zero_phase: true,
            edge_trim_fraction: 0.10,
        }
    }
}

impl PhaseOptions {
    /// Check the trim fraction; the bandpass edges are validated against
    /// the band itself.
    pub fn validate(&self) -> QeegResult<()> {
        if !self.edge_trim_fraction.is_finite()
            || self.edge_trim_fraction < 0.0
            || self.edge_trim_fraction >= 0.5
        {
            return Err(QeegError::invalid_param(
                "edge_trim_fraction must be in [0, 0.49]",
            ));
        }
        Ok(())
    }
}

#[inline]
fn finite(z: &Complex<f64>) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

/// Compute one measure from trimmed analytic signals.
///
/// This is the single dispatch point shared by the offline kernels, the
/// matrices, and the online estimator. Non-finite samples are skipped; the
/// kept count feeds the estimators' denominators.
pub fn measure_from_analytic(measure: PhaseMeasure, za: &[Complex<f64>], zb: &[Complex<f64>]) -> f64 {
    let len = za.len().min(zb.len());
    match measure {
        PhaseMeasure::Plv => {
            let mut acc = Complex::new(0.0, 0.0);
            let mut cnt = 0usize;
            for k in 0..len {
                let (a, b) = (za[k], zb[k]);
                if !finite(&a) || !finite(&b) {
                    continue;
                }
                let (ma, mb) = (a.norm(), b.norm());
                if !(ma > 0.0) || !(mb > 0.0) {
                    continue;
                }
                acc += (a / ma) * (b / mb).conj();
                cnt += 1;
            }
            if cnt == 0 {
                return f64::NAN;
            }
            let v = acc.norm() / cnt as f64;
            if v.is_finite() { v.clamp(0.0, 1.0) } else { f64::NAN }
        }
        PhaseMeasure::Pli => {
            let mut acc = 0.0f64;
            let mut cnt = 0usize;
            for k in 0..len {
                let (a, b) = (za[k], zb[k]);
                if !finite(&a) || !finite(&b) {
                    continue;
                }
                let im = (a * b.conj()).im;
                if !im.is_finite() {
                    continue;
                }
                acc += if im > 0.0 {
                    1.0
                } else if im < 0.0 {
                    -1.0
                } else {
                    0.0
                };
                cnt += 1;
            }
            if cnt == 0 {
                return f64::NAN;
            }
            let v = acc.abs() / cnt as f64;
            if v.is_finite() { v.clamp(0.0, 1.0) } else { f64::NAN }
        }
        PhaseMeasure::WeightedPli => {
            let mut sum_im = 0.0f64;
            let mut sum_abs = 0.0f64;
            for k in 0..len {
                let (a, b) = (za[k], zb[k]);
                if !finite(&a) || !finite(&b) {
                    continue;
                }
                let im = (a * b.conj()).im;
                if !im.is_finite() {
                    continue;
                }
                sum_im += im;
                sum_abs += im.abs();
            }
            if sum_abs > EPS {
                let v = sum_im.abs() / sum_abs;
                if v.is_finite() { v.clamp(0.0, 1.0) } else { f64::NAN }
            } else {
                0.0
            }
        }
        PhaseMeasure::WeightedPli2Debiased => {
            let mut sum_im = 0.0f64;
            let mut sum_abs = 0.0f64;
            let mut sum_sq = 0.0f64;
            let mut cnt = 0usize;
            for k in 0..len {
                let (a, b) = (za[k], zb[k]);
                if !finite(&a) || !finite(&b) {
                    continue;
                }
                let im = (a * b.conj()).im;
                if !im.is_finite() {
                    continue;
                }
                sum_im += im;
                sum_abs += im.abs();
                sum_sq += im * im;
                cnt += 1;
            }
            // Fewer than 2 kept samples cannot be debiased: NaN.
            if cnt < 2 {
                return f64::NAN;
            }
            let denom = sum_abs * sum_abs - sum_sq;
            if denom > EPS {
                let v = (sum_im * sum_im - sum_sq) / denom;
                if v.is_finite() { v.clamp(0.0, 1.0) } else { f64::NAN }
            } else {
                0.0
            }
        }
    }
}

fn analytic_band(
    x: &[Sample],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &PhaseOptions,
) -> Vec<Complex<f64>> {
    let xf = bandpass_filter_band(x, fs_hz, band, opt.zero_phase);
    analytic_signal(&xf)
}

/// Trim bounds for a window of `m` samples; `None` when nothing usable
/// remains.
fn trim_bounds(m: usize, frac: f64) -> Option<(usize, usize)> {
    if m < 4 {
        return None;
    }
    let trim = edge_trim_samples(m, frac);
    let i0 = trim;
    let i1 = m.saturating_sub(trim);
    if i1 <= i0 + 1 { None } else { Some((i0, i1)) }
}

/// Compute one phase-based connectivity measure between two signals.
///
/// Returns NaN (inside `Ok`) when fewer than 4 usable samples remain after
/// trimming; invalid bands or options abort with `InvalidParam`.
pub fn phase_connectivity(
    measure: PhaseMeasure,
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &PhaseOptions,
) -> QeegResult<f64> {
    band.validate_for_fs(fs_hz)?;
    opt.validate()?;

    let n = x.len().min(y.len());
    if n < 4 {
        return Ok(f64::NAN);
    }

    let za = analytic_band(&x[..n], fs_hz, band, opt);
    let zb = analytic_band(&y[..n], fs_hz, band, opt);
    let m = za.len().min(zb.len());
    let Some((i0, i1)) = trim_bounds(m, opt.edge_trim_fraction) else {
        return Ok(f64::NAN);
    };
    Ok(measure_from_analytic(measure, &za[i0..i1], &zb[i0..i1]))
}

/// Phase Locking Value.
pub fn plv(
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &PhaseOptions,
) -> QeegResult<f64> {
    phase_connectivity(PhaseMeasure::Plv, x, y, fs_hz, band, opt)
}

/// Phase Lag Index.
pub fn pli(
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &PhaseOptions,
) -> QeegResult<f64> {
    phase_connectivity(PhaseMeasure::Pli, x, y, fs_hz, band, opt)
}

/// Weighted Phase Lag Index.
pub fn wpli(
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &PhaseOptions,
) -> QeegResult<f64> {
    phase_connectivity(PhaseMeasure::WeightedPli, x, y, fs_hz, band, opt)
}

/// Debiased estimator of squared wPLI (Vinck-style).
///
/// The bias correction can yield small negative raw values; the result is
/// clamped to [0, 1]. Fewer than 2 kept samples return NaN; a vanishing
/// denominator with enough samples returns 0.
pub fn wpli2_debiased(
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &PhaseOptions,
) -> QeegResult<f64> {
    phase_connectivity(PhaseMeasure::WeightedPli2Debiased, x, y, fs_hz, band, opt)
}

/// Symmetric matrix of one phase measure over all channel pairs.
///
/// Analytic signals are built once per channel and shared across pairs.
/// Rows whose input fails the numerical preconditions carry NaN.
pub fn phase_connectivity_matrix(
    measure: PhaseMeasure,
    channels: &[Vec<Sample>],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &PhaseOptions,
) -> QeegResult<Vec<Vec<f64>>> {
    band.validate_for_fs(fs_hz)?;
    opt.validate()?;

    let n_ch = channels.len();
    let mut out = vec![vec![f64::NAN; n_ch]; n_ch];
    if n_ch == 0 {
        return Ok(out);
    }

    let n = channels.iter().map(Vec::len).min().unwrap_or(0);
    if n < 4 {
        log::debug!(
            "{} matrix: common channel length {n} too short, returning NaN",
            measure.name()
        );
        return Ok(out);
    }

    let z: Vec<Vec<Complex<f64>>> = channels
        .iter()
        .map(|ch| analytic_band(&ch[..n], fs_hz, band, opt))
        .collect();
    let m = z.iter().map(Vec::len).min().unwrap_or(0);
    let Some((i0, i1)) = trim_bounds(m, opt.edge_trim_fraction) else {
        log::debug!(
            "{} matrix: no usable samples after edge trim, returning NaN",
            measure.name()
        );
        return Ok(out);
    };

    for (i, row) in out.iter_mut().enumerate() {
        row[i] = measure.self_coupling();
    }
    for i in 0..n_ch {
        for j in i + 1..n_ch {
            let v = measure_from_analytic(measure, &z[i][i0..i1], &z[j][i0..i1]);
            out[i][j] = v;
            out[j][i] = v;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn phasor_track(n: usize, step: f64, offset: f64) -> Vec<Complex<f64>> {
        (0..n)
            .map(|i| Complex::from_polar(1.0, i as f64 * step + offset))
            .collect()
    }

    #[test]
    fn plv_of_constant_offset_is_one() {
        let za = phasor_track(256, 0.2, 0.0);
        let zb = phasor_track(256, 0.2, 1.0);
        let v = measure_from_analytic(PhaseMeasure::Plv, &za, &zb);
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pli_sign_consistency() {
        // A constant positive lag keeps Im(cross) one-signed -> PLI = 1.
        let za = phasor_track(256, 0.2, 0.5);
        let zb = phasor_track(256, 0.2, 0.0);
        let v = measure_from_analytic(PhaseMeasure::Pli, &za, &zb);
        assert!((v - 1.0).abs() < 1e-12);

        // Zero lag -> Im(cross) = 0 everywhere -> PLI = 0.
        let v0 = measure_from_analytic(PhaseMeasure::Pli, &za, &za);
        assert!(v0.abs() < 1e-12);
    }

    #[test]
    fn wpli_zero_lag_is_zero() {
        let za = phasor_track(128, 0.3, 0.0);
        let v = measure_from_analytic(PhaseMeasure::WeightedPli, &za, &za);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn wpli2_small_n_is_nan() {
        let za = phasor_track(1, 0.3, 0.0);
        assert!(measure_from_analytic(PhaseMeasure::WeightedPli2Debiased, &za, &za).is_nan());
    }

    #[test]
    fn empty_input_is_nan() {
        assert!(measure_from_analytic(PhaseMeasure::Plv, &[], &[]).is_nan());
        assert!(measure_from_analytic(PhaseMeasure::Pli, &[], &[]).is_nan());
    }

    #[test]
    fn invalid_band_rejected() {
        let band = BandDefinition::new("bad", 12.0, 8.0);
        let x = vec![0.0f32; 64];
        assert!(plv(&x, &x, 256.0, &band, &PhaseOptions::default()).is_err());

        let above_nyquist = BandDefinition::new("hi", 100.0, 140.0);
        assert!(plv(&x, &x, 256.0, &above_nyquist, &PhaseOptions::default()).is_err());
    }

    #[test]
    fn invalid_trim_rejected() {
        let band = BandDefinition::new("alpha", 8.0, 12.0);
        let x: Vec<f32> = (0..512)
            .map(|i| (2.0 * PI * 10.0 * i as f64 / 256.0).sin() as f32)
            .collect();
        let opt = PhaseOptions {
            zero_phase: true,
            edge_trim_fraction: 0.6,
        };
        assert!(plv(&x, &x, 256.0, &band, &opt).is_err());
    }
}
