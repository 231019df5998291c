//! Streaming preprocessing: referencing and causal filtering
//!
//! The chain is common-average reference, then notch, then high-pass, then
//! low-pass, per channel. All filter state persists across blocks, so
//! concatenated blocks produce the same output as one larger block.

use qeeg_core::{QeegError, QeegResult, Recording, Sample};
use qeeg_dsp::biquad::{Biquad, BiquadCoeffs, filtfilt};
use qeeg_dsp::signal::DEFAULT_BAND_Q;
use qeeg_dsp::Processor;

/// Preprocessing chain configuration. A frequency of 0 disables that
/// stage.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreprocessOptions {
    /// Subtract the cross-channel mean at every sample.
    pub average_reference: bool,
    /// Power-line notch center frequency (e.g. 50 or 60).
    pub notch_hz: f64,
    /// Notch quality; bandwidth is `notch_hz / notch_q`.
    pub notch_q: f64,
    /// High-pass corner.
    pub highpass_hz: f64,
    /// Low-pass corner.
    pub lowpass_hz: f64,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            average_reference: true,
            notch_hz: 0.0,
            notch_q: 30.0,
            highpass_hz: 0.0,
            lowpass_hz: 0.0,
        }
    }
}

impl PreprocessOptions {
    pub fn is_noop(&self) -> bool {
        !self.average_reference
            && self.notch_hz <= 0.0
            && self.highpass_hz <= 0.0
            && self.lowpass_hz <= 0.0
    }

    fn validate(&self, fs_hz: f64) -> QeegResult<()> {
        if !(fs_hz > 0.0) || !fs_hz.is_finite() {
            return Err(QeegError::invalid_param("fs_hz must be > 0"));
        }
        let nyq = 0.5 * fs_hz;
        for (label, f) in [
            ("notch_hz", self.notch_hz),
            ("highpass_hz", self.highpass_hz),
            ("lowpass_hz", self.lowpass_hz),
        ] {
            if f < 0.0 || (f > 0.0 && f >= nyq) {
                return Err(QeegError::invalid_param(format!(
                    "{label} must be 0 (disabled) or in (0, {nyq})"
                )));
            }
        }
        if self.notch_hz > 0.0 && !(self.notch_q > 0.0) {
            return Err(QeegError::invalid_param("notch_q must be > 0"));
        }
        Ok(())
    }
}

/// Causal per-channel preprocessing chain with persistent filter state.
#[derive(Debug)]
pub struct StreamingPreprocessor {
    opt: PreprocessOptions,
    n_channels: usize,
    notch: Vec<Biquad>,
    highpass: Vec<Biquad>,
    lowpass: Vec<Biquad>,
}

impl StreamingPreprocessor {
    pub fn new(n_channels: usize, fs_hz: f64, opt: PreprocessOptions) -> QeegResult<Self> {
        if n_channels == 0 {
            return Err(QeegError::invalid_param("need at least 1 channel"));
        }
        opt.validate(fs_hz)?;

        let bank = |coeffs: Option<BiquadCoeffs>| -> Vec<Biquad> {
            match coeffs {
                Some(c) => (0..n_channels).map(|_| Biquad::new(c)).collect(),
                None => Vec::new(),
            }
        };

        let notch = (opt.notch_hz > 0.0)
            .then(|| BiquadCoeffs::notch(opt.notch_hz, opt.notch_q, fs_hz));
        let highpass = (opt.highpass_hz > 0.0)
            .then(|| BiquadCoeffs::highpass(opt.highpass_hz, DEFAULT_BAND_Q, fs_hz));
        let lowpass = (opt.lowpass_hz > 0.0)
            .then(|| BiquadCoeffs::lowpass(opt.lowpass_hz, DEFAULT_BAND_Q, fs_hz));

        Ok(Self {
            opt,
            n_channels,
            notch: bank(notch),
            highpass: bank(highpass),
            lowpass: bank(lowpass),
        })
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.opt
    }

    /// Process a channel-major block in place.
    pub fn process_block(&mut self, block: &mut [Vec<Sample>]) -> QeegResult<()> {
        if block.len() != self.n_channels {
            return Err(QeegError::state_violation(format!(
                "process_block: expected {} channels, got {}",
                self.n_channels,
                block.len()
            )));
        }
        let n = block.first().map_or(0, Vec::len);
        if block.iter().any(|ch| ch.len() != n) {
            return Err(QeegError::invalid_param(
                "process_block: all channels must have the same number of samples",
            ));
        }

        for i in 0..n {
            if self.opt.average_reference {
                let mean = block.iter().map(|ch| ch[i] as f64).sum::<f64>()
                    / self.n_channels as f64;
                for ch in block.iter_mut() {
                    ch[i] = (ch[i] as f64 - mean) as Sample;
                }
            }
            for (c, ch) in block.iter_mut().enumerate() {
                let mut v = ch[i] as f64;
                if let Some(f) = self.notch.get_mut(c) {
                    v = f.step(v);
                }
                if let Some(f) = self.highpass.get_mut(c) {
                    v = f.step(v);
                }
                if let Some(f) = self.lowpass.get_mut(c) {
                    v = f.step(v);
                }
                ch[i] = v as Sample;
            }
        }
        Ok(())
    }

    /// Clear all filter state.
    pub fn reset(&mut self) {
        for f in self
            .notch
            .iter_mut()
            .chain(self.highpass.iter_mut())
            .chain(self.lowpass.iter_mut())
        {
            f.reset();
        }
    }
}

/// Offline preprocessing over a whole recording.
///
/// Same chain as the streaming path; with `zero_phase` each filter stage is
/// applied forward-backward instead of causally.
pub fn preprocess_recording(
    rec: &mut Recording,
    opt: &PreprocessOptions,
    zero_phase: bool,
) -> QeegResult<()> {
    opt.validate(rec.fs_hz)?;
    let n = rec.n_samples();
    let n_ch = rec.n_channels();
    if n_ch == 0 || n == 0 {
        return Ok(());
    }

    if opt.average_reference {
        for i in 0..n {
            let mean =
                rec.data.iter().map(|ch| ch[i] as f64).sum::<f64>() / n_ch as f64;
            for ch in rec.data.iter_mut() {
                ch[i] = (ch[i] as f64 - mean) as Sample;
            }
        }
    }

    let stages: Vec<BiquadCoeffs> = [
        (opt.notch_hz > 0.0).then(|| BiquadCoeffs::notch(opt.notch_hz, opt.notch_q, rec.fs_hz)),
        (opt.highpass_hz > 0.0)
            .then(|| BiquadCoeffs::highpass(opt.highpass_hz, DEFAULT_BAND_Q, rec.fs_hz)),
        (opt.lowpass_hz > 0.0)
            .then(|| BiquadCoeffs::lowpass(opt.lowpass_hz, DEFAULT_BAND_Q, rec.fs_hz)),
    ]
    .into_iter()
    .flatten()
    .collect();

    for ch in rec.data.iter_mut() {
        for coeffs in &stages {
            *ch = if zero_phase {
                filtfilt(coeffs, ch)
            } else {
                let mut f = Biquad::new(*coeffs);
                ch.iter().map(|&v| f.step(v as f64) as Sample).collect()
            };
        }
    }
    Ok(())
}
