//! Welch-style coherence between channel pairs
//!
//! Coherency is the normalized cross spectrum
//! `Pxy(f) / sqrt(Pxx(f) * Pyy(f))`. Magnitude-squared coherence is its
//! squared magnitude and is sensitive to zero-lag coupling; the absolute
//! imaginary part suppresses purely zero-lag (volume-conduction-like)
//! interactions.

use rustfft::num_complex::Complex;

use qeeg_core::{BandDefinition, QeegError, QeegResult, Sample};
use qeeg_dsp::fft::RealFft;
use qeeg_dsp::welch::{PsdResult, WelchOptions};
use qeeg_dsp::window::{hann_window, window_power};
use qeeg_dsp::integrate_bandpower;

const EPS: f64 = 1e-20;

/// Which scalar is derived from the coherency per frequency bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CoherenceMeasure {
    /// `|Pxy|^2 / (Pxx * Pyy)` in [0, 1].
    MagnitudeSquared,
    /// `|Im(Pxy / sqrt(Pxx * Pyy))|` in [0, 1].
    ImaginaryCoherencyAbs,
}

impl CoherenceMeasure {
    pub fn name(self) -> &'static str {
        match self {
            Self::MagnitudeSquared => "msc",
            Self::ImaginaryCoherencyAbs => "imcoh",
        }
    }

    /// Parse a measure token (`msc`, `coherence`, `imcoh`, `absimag`, ...).
    pub fn parse(token: &str) -> QeegResult<Self> {
        match token.trim().to_lowercase().as_str() {
            "msc" | "coh" | "coherence" | "magnitude_squared" => Ok(Self::MagnitudeSquared),
            "imcoh" | "absimag" | "imag" | "imaginary" => Ok(Self::ImaginaryCoherencyAbs),
            other => Err(QeegError::invalid_param(format!(
                "unknown coherence measure: '{other}' (expected 'msc' or 'imcoh')"
            ))),
        }
    }

    /// Value this measure takes for a channel paired with itself.
    pub fn self_coupling(self) -> f64 {
        match self {
            Self::MagnitudeSquared => 1.0,
            Self::ImaginaryCoherencyAbs => 0.0,
        }
    }
}

/// One-sided coherence spectrum aligned to `[0, fs/2]`.
#[derive(Debug, Clone)]
pub struct CoherenceSpectrum {
    pub measure: CoherenceMeasure,
    pub freqs_hz: Vec<f64>,
    /// Per-bin values in [0, 1]; NaN where the auto-spectra vanish.
    pub values: Vec<f64>,
}

/// Averaged auto- and cross-spectra over Welch segments.
struct CrossSpectra {
    freqs_hz: Vec<f64>,
    pxx: Vec<f64>,
    pyy: Vec<f64>,
    pxy: Vec<Complex<f64>>,
}

fn cross_spectra(
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    opt: &WelchOptions,
) -> QeegResult<CrossSpectra> {
    let n = x.len().min(y.len());
    opt.validate(n, fs_hz)?;

    let nperseg = opt.nperseg;
    let fft = RealFft::new(nperseg)?;
    let window = hann_window(nperseg);
    let step = opt.step();

    let bins = fft.spectrum_len();
    let mut scratch = fft.make_input();
    let mut spec_x = fft.make_output();
    let mut spec_y = fft.make_output();
    let mut pxx = vec![0.0f64; bins];
    let mut pyy = vec![0.0f64; bins];
    let mut pxy = vec![Complex::new(0.0, 0.0); bins];

    let segment = |seg: &[Sample], scratch: &mut [f64], out: &mut [Complex<f64>]| {
        let mean = seg.iter().map(|&v| v as f64).sum::<f64>() / nperseg as f64;
        for (dst, (&src, &w)) in scratch.iter_mut().zip(seg.iter().zip(&window)) {
            *dst = (src as f64 - mean) * w;
        }
        fft.process(scratch, out)
    };

    let mut n_segments = 0usize;
    let mut start = 0usize;
    while start + nperseg <= n {
        segment(&x[start..start + nperseg], &mut scratch, &mut spec_x)?;
        segment(&y[start..start + nperseg], &mut scratch, &mut spec_y)?;
        for b in 0..bins {
            pxx[b] += spec_x[b].norm_sqr();
            pyy[b] += spec_y[b].norm_sqr();
            pxy[b] += spec_x[b] * spec_y[b].conj();
        }
        n_segments += 1;
        start += step;
    }
    if n_segments == 0 {
        return Err(QeegError::insufficient_data(
            "no complete Welch segment fits the input",
        ));
    }

    // The Welch normalization cancels in every coherence ratio, but keeping
    // it makes the intermediate spectra physically scaled.
    let scale = 1.0 / (fs_hz * window_power(&window) * n_segments as f64);
    for b in 0..bins {
        pxx[b] *= scale;
        pyy[b] *= scale;
        pxy[b] *= scale;
    }

    let freqs_hz = (0..bins).map(|i| i as f64 * fs_hz / nperseg as f64).collect();
    Ok(CrossSpectra {
        freqs_hz,
        pxx,
        pyy,
        pxy,
    })
}

/// Compute a coherence spectrum between `x` and `y`.
pub fn coherence_spectrum(
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    opt: &WelchOptions,
    measure: CoherenceMeasure,
) -> QeegResult<CoherenceSpectrum> {
    let cs = cross_spectra(x, y, fs_hz, opt)?;
    let values = cs
        .pxy
        .iter()
        .zip(cs.pxx.iter().zip(&cs.pyy))
        .map(|(pxy, (&pxx, &pyy))| {
            let denom = pxx * pyy;
            if denom <= EPS {
                return f64::NAN;
            }
            let v = match measure {
                CoherenceMeasure::MagnitudeSquared => pxy.norm_sqr() / denom,
                CoherenceMeasure::ImaginaryCoherencyAbs => (pxy.im / denom.sqrt()).abs(),
            };
            if v.is_finite() { v.clamp(0.0, 1.0) } else { f64::NAN }
        })
        .collect();
    Ok(CoherenceSpectrum {
        measure,
        freqs_hz: cs.freqs_hz,
        values,
    })
}

/// Magnitude-squared coherence spectrum (the common default).
pub fn msc_spectrum(
    x: &[Sample],
    y: &[Sample],
    fs_hz: f64,
    opt: &WelchOptions,
) -> QeegResult<CoherenceSpectrum> {
    coherence_spectrum(x, y, fs_hz, opt, CoherenceMeasure::MagnitudeSquared)
}

/// Average a coherence spectrum over a frequency band.
///
/// Trapezoid integration divided by the overlapped band width; NaN when the
/// band does not overlap the spectrum.
pub fn band_average(spec: &CoherenceSpectrum, fmin_hz: f64, fmax_hz: f64) -> f64 {
    if spec.freqs_hz.len() < 2 || !(fmax_hz > fmin_hz) {
        return f64::NAN;
    }
    let lo = spec.freqs_hz[0].max(fmin_hz);
    let hi = spec.freqs_hz[spec.freqs_hz.len() - 1].min(fmax_hz);
    if !(hi > lo) {
        return f64::NAN;
    }
    let as_psd = PsdResult {
        freqs_hz: spec.freqs_hz.clone(),
        psd: spec.values.clone(),
    };
    match integrate_bandpower(&as_psd, lo, hi) {
        Ok(area) => area / (hi - lo),
        Err(_) => f64::NAN,
    }
}

/// Convenience overload for a [`BandDefinition`].
pub fn band_average_band(spec: &CoherenceSpectrum, band: &BandDefinition) -> f64 {
    band_average(spec, band.fmin_hz, band.fmax_hz)
}

/// Symmetric matrix of band-averaged coherence over all channel pairs.
///
/// The diagonal carries the measure's self-coupling value (1 for
/// magnitude-squared coherence, 0 for imaginary coherency).
pub fn coherence_band_matrix(
    channels: &[Vec<Sample>],
    fs_hz: f64,
    band: &BandDefinition,
    opt: &WelchOptions,
    measure: CoherenceMeasure,
) -> QeegResult<Vec<Vec<f64>>> {
    let n_ch = channels.len();
    let mut out = vec![vec![f64::NAN; n_ch]; n_ch];
    for (i, row) in out.iter_mut().enumerate() {
        row[i] = measure.self_coupling();
    }
    for i in 0..n_ch {
        for j in i + 1..n_ch {
            let spec = coherence_spectrum(&channels[i], &channels[j], fs_hz, opt, measure)?;
            let v = band_average_band(&spec, band);
            out[i][j] = v;
            out[j][i] = v;
        }
    }
    Ok(out)
}
