//! qeeg-dsp: DSP primitives for the QEEG engine
//!
//! ## Modules
//! - `biquad` - TDF-II biquad filters (lowpass, highpass, bandpass, notch)
//!   plus forward-backward (zero-phase) filtering
//! - `window` - Hann window
//! - `fft` - cached real and complex FFT plans
//! - `hilbert` - FFT-based analytic signal, edge trimming
//! - `signal` - high-pass + low-pass band filtering shared by the metrics
//! - `welch` - Welch PSD
//! - `bandpower` - trapezoid band integration, relative power, baseline
//!   normalization

pub mod bandpower;
pub mod biquad;
pub mod fft;
pub mod hilbert;
pub mod signal;
pub mod welch;
pub mod window;

pub use bandpower::{
    BaselineNormMode, baseline_normalize, integrate_bandpower, relative_bandpower,
};
pub use biquad::{Biquad, BiquadCoeffs, FilterKind, filter_forward, filtfilt};
pub use fft::{ComplexFftPair, RealFft};
pub use hilbert::{analytic_signal, analytic_signal_with, edge_trim_samples};
pub use signal::{DEFAULT_BAND_Q, bandpass_filter, bandpass_filter_band};
pub use welch::{PsdResult, WelchOptions, welch_psd};
pub use window::{hann_window, window_power};

use qeeg_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send {
    /// Reset processor state
    fn reset(&mut self);
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples in place
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
