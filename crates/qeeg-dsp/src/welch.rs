//! Welch power spectral density

use rustfft::num_complex::Complex;

use crate::fft::RealFft;
use crate::window::{hann_window, window_power};
use qeeg_core::{QeegError, QeegResult, Sample};

/// Options for Welch-style spectral estimation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WelchOptions {
    /// Segment length in samples (>= 8).
    pub nperseg: usize,
    /// Fractional overlap between segments, in [0, 1).
    pub overlap_fraction: f64,
}

impl Default for WelchOptions {
    fn default() -> Self {
        Self {
            nperseg: 512,
            overlap_fraction: 0.5,
        }
    }
}

impl WelchOptions {
    /// Check the options against an input length and sampling rate.
    pub fn validate(&self, input_len: usize, fs_hz: f64) -> QeegResult<()> {
        if !(fs_hz > 0.0) || !fs_hz.is_finite() {
            return Err(QeegError::invalid_param("fs_hz must be > 0"));
        }
        if self.nperseg < 8 {
            return Err(QeegError::invalid_param("nperseg must be >= 8"));
        }
        if self.nperseg > input_len {
            return Err(QeegError::invalid_param(format!(
                "nperseg ({}) exceeds input length ({})",
                self.nperseg, input_len
            )));
        }
        if !(0.0..1.0).contains(&self.overlap_fraction) {
            return Err(QeegError::invalid_param(
                "overlap_fraction must be in [0, 1)",
            ));
        }
        Ok(())
    }

    /// Hop between consecutive segment starts.
    pub fn step(&self) -> usize {
        let noverlap = (self.nperseg as f64 * self.overlap_fraction).floor() as usize;
        (self.nperseg - noverlap).max(1)
    }
}

/// One-sided power spectral density on a uniform frequency grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsdResult {
    /// Strictly increasing, `[0, fs/nperseg, ..., fs/2]`.
    pub freqs_hz: Vec<f64>,
    /// Same length as `freqs_hz`, units of power per Hz.
    pub psd: Vec<f64>,
}

/// Welch PSD estimate.
///
/// Partitions `x` into overlapping Hann-windowed segments of `nperseg`
/// samples, removes each segment's mean, averages the squared spectra and
/// normalizes by `fs * sum(w^2)`. Bins strictly between DC and Nyquist are
/// doubled to fold the two-sided spectrum.
pub fn welch_psd(x: &[Sample], fs_hz: f64, opt: &WelchOptions) -> QeegResult<PsdResult> {
    opt.validate(x.len(), fs_hz)?;
    let fft = RealFft::new(opt.nperseg)?;
    let window = hann_window(opt.nperseg);
    let mut scratch = fft.make_input();
    let mut spectrum = fft.make_output();
    let mut acc = vec![0.0f64; fft.spectrum_len()];

    let n_segments = accumulate_psd(x, opt, &fft, &window, &mut scratch, &mut spectrum, &mut acc)?;
    debug_assert!(n_segments > 0);

    let scale = 1.0 / (fs_hz * window_power(&window) * n_segments as f64);
    let n = opt.nperseg;
    let mut psd: Vec<f64> = acc.iter().map(|p| p * scale).collect();
    fold_one_sided(&mut psd, n);

    let freqs_hz = (0..psd.len()).map(|i| i as f64 * fs_hz / n as f64).collect();
    Ok(PsdResult { freqs_hz, psd })
}

/// Double every bin except DC and (for even `nperseg`) Nyquist.
pub(crate) fn fold_one_sided(psd: &mut [f64], nperseg: usize) {
    let last = psd.len() - 1;
    for (i, p) in psd.iter_mut().enumerate() {
        if i == 0 {
            continue;
        }
        if nperseg % 2 == 0 && i == last {
            continue;
        }
        *p *= 2.0;
    }
}

fn accumulate_psd(
    x: &[Sample],
    opt: &WelchOptions,
    fft: &RealFft,
    window: &[f64],
    scratch: &mut [f64],
    spectrum: &mut [Complex<f64>],
    acc: &mut [f64],
) -> QeegResult<usize> {
    let n = opt.nperseg;
    let step = opt.step();
    let mut n_segments = 0usize;
    let mut start = 0usize;
    while start + n <= x.len() {
        let seg = &x[start..start + n];
        let mean = seg.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        for (dst, (&src, &w)) in scratch.iter_mut().zip(seg.iter().zip(window)) {
            *dst = (src as f64 - mean) * w;
        }
        fft.process(scratch, spectrum)?;
        for (a, s) in acc.iter_mut().zip(spectrum.iter()) {
            *a += s.norm_sqr();
        }
        n_segments += 1;
        start += step;
    }
    if n_segments == 0 {
        return Err(QeegError::insufficient_data(
            "no complete Welch segment fits the input",
        ));
    }
    Ok(n_segments)
}
