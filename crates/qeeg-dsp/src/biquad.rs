//! Biquad filter implementation using Transposed Direct Form II
//!
//! TDF-II is numerically well behaved in floating point, which matters for
//! the narrow EEG bands this engine filters into (sub-Hz high-pass corners
//! at a few hundred Hz sampling rate).

use std::f64::consts::PI;

use crate::{MonoProcessor, Processor};
use qeeg_core::{QeegError, QeegResult, Sample};

/// Filter response types used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Biquad coefficients (normalized so a0 == 1)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Calculate lowpass filter coefficients
    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = (1.0 - cos_omega) / 2.0;
        let b1 = 1.0 - cos_omega;
        let b2 = (1.0 - cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate highpass filter coefficients
    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = (1.0 + cos_omega) / 2.0;
        let b1 = -(1.0 + cos_omega);
        let b2 = (1.0 + cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate bandpass filter coefficients (constant 0 dB peak gain)
    pub fn bandpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = alpha;
        let b1 = 0.0;
        let b2 = -alpha;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate notch filter coefficients.
    ///
    /// The rejection bandwidth is `freq / q`.
    pub fn notch(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = 1.0;
        let b1 = -2.0 * cos_omega;
        let b2 = 1.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Bypass (unity gain, no filtering)
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Coefficients for a given kind; `freq` must be in (0, fs/2).
    pub fn for_kind(kind: FilterKind, freq: f64, q: f64, sample_rate: f64) -> QeegResult<Self> {
        if !(sample_rate > 0.0) {
            return Err(QeegError::invalid_param("sample_rate must be > 0"));
        }
        if !(freq > 0.0) || freq >= 0.5 * sample_rate {
            return Err(QeegError::invalid_param(format!(
                "filter frequency {freq} Hz out of (0, {}) range",
                0.5 * sample_rate
            )));
        }
        if !(q > 0.0) {
            return Err(QeegError::invalid_param("q must be > 0"));
        }
        Ok(match kind {
            FilterKind::Lowpass => Self::lowpass(freq, q, sample_rate),
            FilterKind::Highpass => Self::highpass(freq, q, sample_rate),
            FilterKind::Bandpass => Self::bandpass(freq, q, sample_rate),
            FilterKind::Notch => Self::notch(freq, q, sample_rate),
        })
    }
}

/// Transposed Direct Form II biquad filter with per-instance state
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::bypass())
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    /// Filter one f64 sample.
    #[inline(always)]
    pub fn step(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}

impl Processor for Biquad {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for Biquad {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        self.step(input as f64) as Sample
    }
}

/// Forward pass of a causal biquad over a whole buffer (fresh state).
pub fn filter_forward(coeffs: &BiquadCoeffs, x: &[Sample]) -> Vec<Sample> {
    let mut f = Biquad::new(*coeffs);
    x.iter().map(|&v| f.step(v as f64) as Sample).collect()
}

/// Forward-backward (zero-phase) filtering. Offline only.
///
/// Runs the filter forward, reverses the result, runs forward again on the
/// reversed series, and reverses back. Squares the magnitude response and
/// cancels the phase response.
pub fn filtfilt(coeffs: &BiquadCoeffs, x: &[Sample]) -> Vec<Sample> {
    let mut y = filter_forward(coeffs, x);
    y.reverse();
    let mut z = filter_forward(coeffs, &y);
    z.reverse();
    z
}
