//! FFT plan wrappers
//!
//! One real-to-complex plan per estimator, reused across frames; scratch
//! buffers are owned by the callers so the hot path stays allocation-free.

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use qeeg_core::{QeegError, QeegResult};

/// Cached real-to-complex FFT of a fixed length (power-of-two not required).
pub struct RealFft {
    fft: Arc<dyn RealToComplex<f64>>,
    len: usize,
}

impl RealFft {
    pub fn new(len: usize) -> QeegResult<Self> {
        if len < 2 {
            return Err(QeegError::invalid_param("FFT length must be >= 2"));
        }
        let mut planner = RealFftPlanner::new();
        Ok(Self {
            fft: planner.plan_fft_forward(len),
            len,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of one-sided spectrum bins (`len/2 + 1`).
    #[inline]
    pub fn spectrum_len(&self) -> usize {
        self.len / 2 + 1
    }

    pub fn make_input(&self) -> Vec<f64> {
        vec![0.0; self.len]
    }

    pub fn make_output(&self) -> Vec<Complex<f64>> {
        vec![Complex::new(0.0, 0.0); self.spectrum_len()]
    }

    /// Transform `input` (destroyed in the process) into `output`.
    pub fn process(&self, input: &mut [f64], output: &mut [Complex<f64>]) -> QeegResult<()> {
        self.fft
            .process(input, output)
            .map_err(|e| QeegError::numerical(format!("real FFT failed: {e}")))
    }
}

impl std::fmt::Debug for RealFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFft").field("len", &self.len).finish()
    }
}

/// Forward/inverse complex FFT pair of a fixed length.
///
/// Used by the analytic-signal construction, which needs the full two-sided
/// spectrum. The inverse pass applies the 1/N normalization rustfft leaves
/// to the caller.
pub struct ComplexFftPair {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    len: usize,
}

impl ComplexFftPair {
    pub fn new(len: usize) -> QeegResult<Self> {
        if len < 2 {
            return Err(QeegError::invalid_param("FFT length must be >= 2"));
        }
        let mut planner = FftPlanner::new();
        Ok(Self {
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
            len,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn forward(&self, buf: &mut [Complex<f64>]) {
        self.forward.process(buf);
    }

    /// Inverse transform, normalized by 1/N.
    pub fn inverse(&self, buf: &mut [Complex<f64>]) {
        self.inverse.process(buf);
        let scale = 1.0 / self.len as f64;
        for v in buf.iter_mut() {
            *v *= scale;
        }
    }
}

impl std::fmt::Debug for ComplexFftPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplexFftPair")
            .field("len", &self.len)
            .finish()
    }
}
