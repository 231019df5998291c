//! FFT-based analytic signal (Hilbert transform construction)

use rustfft::num_complex::Complex;

use crate::fft::ComplexFftPair;
use qeeg_core::Sample;

/// Compute the analytic signal of `x`.
///
/// Construction: FFT of length N; zero the strictly-negative-frequency
/// bins; double the strictly-positive-frequency bins; leave DC and (for
/// even N) Nyquist unchanged; inverse FFT. The output has the same length
/// as the input; its magnitude is the envelope and its argument the
/// instantaneous phase.
pub fn analytic_signal(x: &[Sample]) -> Vec<Complex<f64>> {
    let n = x.len();
    if n < 2 {
        return x.iter().map(|&v| Complex::new(v as f64, 0.0)).collect();
    }

    // Plan creation is cheap relative to the transform at EEG window sizes;
    // callers that need to amortize it use `analytic_signal_with`.
    let pair = match ComplexFftPair::new(n) {
        Ok(p) => p,
        Err(_) => return x.iter().map(|&v| Complex::new(v as f64, 0.0)).collect(),
    };
    analytic_signal_with(&pair, x)
}

/// Analytic signal using a caller-owned FFT pair of matching length.
pub fn analytic_signal_with(pair: &ComplexFftPair, x: &[Sample]) -> Vec<Complex<f64>> {
    let n = x.len();
    debug_assert_eq!(pair.len(), n);

    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v as f64, 0.0)).collect();
    pair.forward(&mut buf);

    // One-sided spectrum gain. For even N bin n/2 is the shared Nyquist bin
    // and stays untouched; for odd N every bin above (n-1)/2 is negative
    // frequency.
    let pos_end = if n % 2 == 0 { n / 2 } else { n / 2 + 1 };
    for (k, v) in buf.iter_mut().enumerate().skip(1) {
        if k < pos_end {
            *v *= 2.0;
        } else if n % 2 == 0 && k == n / 2 {
            // Nyquist: unchanged
        } else {
            *v = Complex::new(0.0, 0.0);
        }
    }

    pair.inverse(&mut buf);
    buf
}

/// How many samples to discard at each edge of a windowed metric.
///
/// `frac` is clamped to [0, 0.49].
pub fn edge_trim_samples(n: usize, frac: f64) -> usize {
    let f = if frac.is_finite() {
        frac.clamp(0.0, 0.49)
    } else {
        0.0
    };
    (n as f64 * f).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn analytic_of_cosine_has_unit_envelope() {
        let fs = 256.0;
        let n = 1024;
        let x: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 16.0 * i as f64 / fs).cos() as f32)
            .collect();
        let z = analytic_signal(&x);
        assert_eq!(z.len(), n);
        // Interior envelope should hug 1.0.
        for zi in &z[n / 4..3 * n / 4] {
            assert!((zi.norm() - 1.0).abs() < 0.02, "envelope {}", zi.norm());
        }
    }

    #[test]
    fn analytic_phase_advances_at_signal_frequency() {
        let fs = 256.0;
        let f0 = 10.0;
        let n = 2048;
        let x: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * f0 * i as f64 / fs).sin() as f32)
            .collect();
        let z = analytic_signal(&x);
        // Unwrapped phase difference between adjacent interior samples is
        // 2*pi*f0/fs.
        let expected = 2.0 * PI * f0 / fs;
        for i in n / 4..n / 4 + 64 {
            let mut d = z[i + 1].arg() - z[i].arg();
            while d < -PI {
                d += 2.0 * PI;
            }
            while d > PI {
                d -= 2.0 * PI;
            }
            assert!((d - expected).abs() < 0.02, "phase step {d}");
        }
    }

    #[test]
    fn real_part_reconstructs_input() {
        let x: Vec<f32> = (0..257).map(|i| ((i * 7919) % 101) as f32 / 50.0 - 1.0).collect();
        let z = analytic_signal(&x);
        for (a, b) in x.iter().zip(&z) {
            assert!((*a as f64 - b.re).abs() < 1e-9);
        }
    }

    #[test]
    fn trim_clamps_fraction() {
        assert_eq!(edge_trim_samples(100, 0.10), 10);
        assert_eq!(edge_trim_samples(100, -1.0), 0);
        assert_eq!(edge_trim_samples(100, 0.9), 49);
        assert_eq!(edge_trim_samples(100, f64::NAN), 0);
    }
}
