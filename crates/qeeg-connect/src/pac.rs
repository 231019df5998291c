//! Phase-amplitude coupling
//!
//! Both estimators start from the same decomposition of one channel:
//! phase of the analytic signal in the low band, amplitude envelope of the
//! analytic signal in the high band, edges trimmed.

use std::f64::consts::PI;

use qeeg_core::{BandDefinition, QeegError, QeegResult, Sample};
use qeeg_dsp::{analytic_signal, bandpass_filter_band, edge_trim_samples};
use rustfft::num_complex::Complex;

/// PAC estimator variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PacMethod {
    /// Tort's modulation index: normalized KL divergence of the
    /// phase-binned amplitude distribution from uniform.
    ModulationIndex,
    /// Mean vector length: magnitude of the amplitude-weighted phasor mean.
    MeanVectorLength,
}

impl PacMethod {
    pub fn name(self) -> &'static str {
        match self {
            Self::ModulationIndex => "mi",
            Self::MeanVectorLength => "mvl",
        }
    }
}

/// PAC options.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PacOptions {
    pub method: PacMethod,
    /// Number of uniform phase bins over [-pi, pi) for the modulation
    /// index.
    pub n_phase_bins: usize,
    /// Fraction trimmed at each edge after filtering. In [0, 0.49].
    pub edge_trim_fraction: f64,
    /// Zero-phase internal filtering (offline); causal when false.
    pub zero_phase: bool,
}

impl Default for PacOptions {
    fn default() -> Self {
        Self {
            method: PacMethod::ModulationIndex,
            n_phase_bins: 18,
            edge_trim_fraction: 0.10,
            zero_phase: true,
        }
    }
}

/// A PAC estimate plus the phase-binned amplitude distribution behind it.
#[derive(Debug, Clone)]
pub struct PacEstimate {
    pub method: PacMethod,
    /// The coupling value; in [0, 1] for both methods, NaN when the
    /// amplitude mass vanishes.
    pub value: f64,
    /// Bin-center phases in radians (empty for MVL).
    pub phase_bin_centers: Vec<f64>,
    /// Normalized mean amplitude per phase bin, summing to 1 (empty for
    /// MVL).
    pub amplitude_distribution: Vec<f64>,
}

/// Compute phase-amplitude coupling on a single channel window.
pub fn pac(
    x: &[Sample],
    fs_hz: f64,
    phase_band: &BandDefinition,
    amp_band: &BandDefinition,
    opt: &PacOptions,
) -> QeegResult<PacEstimate> {
    phase_band.validate_for_fs(fs_hz)?;
    amp_band.validate_for_fs(fs_hz)?;
    if !opt.edge_trim_fraction.is_finite()
        || opt.edge_trim_fraction < 0.0
        || opt.edge_trim_fraction >= 0.5
    {
        return Err(QeegError::invalid_param(
            "edge_trim_fraction must be in [0, 0.49]",
        ));
    }
    if opt.method == PacMethod::ModulationIndex && opt.n_phase_bins < 2 {
        return Err(QeegError::invalid_param("n_phase_bins must be >= 2"));
    }

    let nan = |method| {
        Ok(PacEstimate {
            method,
            value: f64::NAN,
            phase_bin_centers: Vec::new(),
            amplitude_distribution: Vec::new(),
        })
    };

    if x.len() < 4 {
        return nan(opt.method);
    }

    let z_phase = analytic_signal(&bandpass_filter_band(x, fs_hz, phase_band, opt.zero_phase));
    let z_amp = analytic_signal(&bandpass_filter_band(x, fs_hz, amp_band, opt.zero_phase));

    let m = z_phase.len().min(z_amp.len());
    let trim = edge_trim_samples(m, opt.edge_trim_fraction);
    let i0 = trim;
    let i1 = m.saturating_sub(trim);
    if i1 <= i0 + 1 {
        return nan(opt.method);
    }

    // Collect finite (phase, amplitude) pairs.
    let pairs: Vec<(f64, f64)> = (i0..i1)
        .filter_map(|i| {
            let zp: &Complex<f64> = &z_phase[i];
            let za: &Complex<f64> = &z_amp[i];
            let phi = zp.im.atan2(zp.re);
            let a = za.norm();
            (phi.is_finite() && a.is_finite()).then_some((phi, a))
        })
        .collect();
    if pairs.is_empty() {
        return nan(opt.method);
    }

    match opt.method {
        PacMethod::MeanVectorLength => {
            let mut acc = Complex::new(0.0, 0.0);
            let mut amp_sum = 0.0;
            for &(phi, a) in &pairs {
                acc += Complex::from_polar(a, phi);
                amp_sum += a;
            }
            let value = if amp_sum > 0.0 { acc.norm() / amp_sum } else { 0.0 };
            Ok(PacEstimate {
                method: opt.method,
                value,
                phase_bin_centers: Vec::new(),
                amplitude_distribution: Vec::new(),
            })
        }
        PacMethod::ModulationIndex => {
            let nbins = opt.n_phase_bins;
            let mut amp_sum = vec![0.0f64; nbins];
            let mut amp_cnt = vec![0usize; nbins];
            for &(phi, a) in &pairs {
                // Map [-pi, pi) onto [0, nbins).
                let frac = (phi + PI) / (2.0 * PI);
                let bin = ((frac * nbins as f64).floor() as isize)
                    .clamp(0, nbins as isize - 1) as usize;
                amp_sum[bin] += a;
                amp_cnt[bin] += 1;
            }

            let mean_amp: Vec<f64> = amp_sum
                .iter()
                .zip(&amp_cnt)
                .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
                .collect();
            let total: f64 = mean_amp.iter().sum();

            let centers: Vec<f64> = (0..nbins)
                .map(|b| -PI + (b as f64 + 0.5) * 2.0 * PI / nbins as f64)
                .collect();

            if !(total > 0.0) || !total.is_finite() {
                return Ok(PacEstimate {
                    method: opt.method,
                    value: f64::NAN,
                    phase_bin_centers: centers,
                    amplitude_distribution: vec![0.0; nbins],
                });
            }

            let p: Vec<f64> = mean_amp.iter().map(|&a| a / total).collect();
            let entropy: f64 = p
                .iter()
                .map(|&pb| if pb > 0.0 { -pb * pb.ln() } else { 0.0 })
                .sum();
            let log_b = (nbins as f64).ln();
            let value = ((log_b - entropy) / log_b).clamp(0.0, 1.0);

            Ok(PacEstimate {
                method: opt.method,
                value,
                phase_bin_centers: centers,
                amplitude_distribution: p,
            })
        }
    }
}
