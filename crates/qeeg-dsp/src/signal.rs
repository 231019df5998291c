//! Shared band-filtering helpers
//!
//! These utilities are used by multiple higher-level metrics (PAC, phase
//! connectivity) to avoid duplicating common filtering logic.

use crate::biquad::{BiquadCoeffs, filter_forward, filtfilt};
use qeeg_core::{BandDefinition, Sample};

/// Default Q for the band-edge filters (Butterworth-like, 1/sqrt(2)).
pub const DEFAULT_BAND_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Apply a simple bandpass built from a high-pass + low-pass biquad.
///
/// - `lo_hz` or `hi_hz` may be 0 to disable that edge.
/// - If both are 0, returns `x` unchanged.
/// - If `zero_phase` is true, uses forward-backward filtering per stage.
pub fn bandpass_filter(
    x: &[Sample],
    fs_hz: f64,
    lo_hz: f64,
    hi_hz: f64,
    zero_phase: bool,
    q: f64,
) -> Vec<Sample> {
    if fs_hz <= 0.0 || x.is_empty() {
        return x.to_vec();
    }
    let mut y: Vec<Sample> = x.to_vec();
    let nyq = 0.5 * fs_hz;

    if lo_hz > 0.0 {
        if lo_hz < nyq {
            let coeffs = BiquadCoeffs::highpass(lo_hz, q, fs_hz);
            y = if zero_phase {
                filtfilt(&coeffs, &y)
            } else {
                filter_forward(&coeffs, &y)
            };
        } else {
            log::warn!("high-pass edge {lo_hz} Hz at or above Nyquist ({nyq} Hz), stage skipped");
        }
    }
    if hi_hz > 0.0 {
        if hi_hz < nyq {
            let coeffs = BiquadCoeffs::lowpass(hi_hz, q, fs_hz);
            y = if zero_phase {
                filtfilt(&coeffs, &y)
            } else {
                filter_forward(&coeffs, &y)
            };
        } else {
            log::warn!("low-pass edge {hi_hz} Hz at or above Nyquist ({nyq} Hz), stage skipped");
        }
    }
    y
}

/// Convenience overload for a [`BandDefinition`].
pub fn bandpass_filter_band(
    x: &[Sample],
    fs_hz: f64,
    band: &BandDefinition,
    zero_phase: bool,
) -> Vec<Sample> {
    bandpass_filter(x, fs_hz, band.fmin_hz, band.fmax_hz, zero_phase, DEFAULT_BAND_Q)
}
