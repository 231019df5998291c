//! Online windowed band power

use crate::framing::{FrameClock, resolve_window, validate_block};
use crate::ring::RingBuffer;
use qeeg_core::{BandDefinition, QeegError, QeegResult, Sample, default_eeg_bands};
use qeeg_dsp::welch::{WelchOptions, welch_psd};
use qeeg_dsp::integrate_bandpower;

/// Options for [`OnlineBandpower`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OnlineBandpowerOptions {
    /// Sliding analysis window length.
    pub window_seconds: f64,
    /// How often to emit a new frame.
    pub update_seconds: f64,
    /// Welch settings for the per-window PSD. `nperseg` is clamped to the
    /// window length.
    pub welch: WelchOptions,
}

impl Default for OnlineBandpowerOptions {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            update_seconds: 0.25,
            welch: WelchOptions::default(),
        }
    }
}

/// One band-power frame.
#[derive(Debug, Clone)]
pub struct BandpowerFrame {
    /// Time (seconds) of the most recently pushed sample.
    pub t_end_sec: f64,
    /// `values[band_index][channel_index]`, absolute band power.
    pub values: Vec<Vec<f64>>,
}

/// Online/windowed Welch band power over all channels.
#[derive(Debug)]
pub struct OnlineBandpower {
    channel_names: Vec<String>,
    fs_hz: f64,
    bands: Vec<BandDefinition>,
    welch: WelchOptions,
    window_samples: usize,
    clock: FrameClock,
    rings: Vec<RingBuffer>,
    scratch: Vec<Sample>,
}

impl OnlineBandpower {
    pub fn new(
        channel_names: Vec<String>,
        fs_hz: f64,
        bands: Vec<BandDefinition>,
        opt: OnlineBandpowerOptions,
    ) -> QeegResult<Self> {
        if channel_names.is_empty() {
            return Err(QeegError::invalid_param("need at least 1 channel"));
        }
        let bands = if bands.is_empty() { default_eeg_bands() } else { bands };
        for b in &bands {
            if !(b.fmax_hz > b.fmin_hz) || b.fmin_hz < 0.0 {
                return Err(QeegError::invalid_param(format!(
                    "band '{}' requires 0 <= fmin < fmax",
                    b.name
                )));
            }
        }
        let (window_samples, update_samples) =
            resolve_window(opt.window_seconds, opt.update_seconds, fs_hz)?;
        let rings = channel_names
            .iter()
            .map(|_| RingBuffer::with_capacity(window_samples))
            .collect::<QeegResult<Vec<_>>>()?;

        Ok(Self {
            channel_names,
            fs_hz,
            bands,
            welch: opt.welch,
            window_samples,
            clock: FrameClock::new(fs_hz, update_samples),
            rings,
            scratch: Vec::with_capacity(window_samples),
        })
    }

    pub fn n_channels(&self) -> usize {
        self.channel_names.len()
    }

    pub fn bands(&self) -> &[BandDefinition] {
        &self.bands
    }

    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    /// Push a channel-major block; frames are returned in temporal order.
    pub fn push_block(&mut self, block: &[Vec<Sample>]) -> QeegResult<Vec<BandpowerFrame>> {
        let n = validate_block(block, self.rings.len())?;
        let mut frames = Vec::new();
        for i in 0..n {
            for (ring, ch) in self.rings.iter_mut().zip(block) {
                ring.push(ch[i]);
            }
            if self.clock.tick() && self.rings[0].is_full() {
                frames.push(self.compute_frame());
            }
        }
        Ok(frames)
    }

    fn compute_frame(&mut self) -> BandpowerFrame {
        let n_ch = self.rings.len();
        let mut values = vec![vec![f64::NAN; n_ch]; self.bands.len()];

        let welch = WelchOptions {
            nperseg: self.welch.nperseg.min(self.window_samples).max(8),
            overlap_fraction: self.welch.overlap_fraction,
        };

        for c in 0..n_ch {
            // Borrow dance: move the scratch buffer out while extracting.
            let mut scratch = std::mem::take(&mut self.scratch);
            self.rings[c].extract_into(&mut scratch);
            let psd = welch_psd(&scratch, self.fs_hz, &welch);
            if let Ok(psd) = psd {
                for (bi, band) in self.bands.iter().enumerate() {
                    values[bi][c] =
                        integrate_bandpower(&psd, band.fmin_hz, band.fmax_hz).unwrap_or(f64::NAN);
                }
            }
            self.scratch = scratch;
        }

        BandpowerFrame {
            t_end_sec: self.clock.t_end_sec(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine_block(fs: f64, f0: f64, n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| (2.0 * PI * f0 * i as f64 / fs).sin() as f32)
            .collect()
    }

    fn engine(fs: f64) -> OnlineBandpower {
        OnlineBandpower::new(
            vec!["Pz".into()],
            fs,
            default_eeg_bands(),
            OnlineBandpowerOptions {
                window_seconds: 2.0,
                update_seconds: 0.25,
                welch: WelchOptions {
                    nperseg: 256,
                    overlap_fraction: 0.5,
                },
            },
        )
        .unwrap()
    }

    #[test]
    fn framing_count_and_times() {
        let fs = 256.0;
        let mut eng = engine(fs);
        // window = 512, update = 64: after 512 + 3*64 samples -> 4 frames.
        let block = vec![sine_block(fs, 10.0, 512 + 3 * 64)];
        let frames = eng.push_block(&block).unwrap();
        assert_eq!(frames.len(), 4);
        for (i, fr) in frames.iter().enumerate() {
            let expected = (512 + i * 64) as f64 / fs;
            assert!((fr.t_end_sec - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn frames_are_identical_across_chunkings() {
        let fs = 256.0;
        let x = sine_block(fs, 10.0, 1024);

        let mut eng_whole = engine(fs);
        let frames_whole = eng_whole.push_block(&[x.clone()]).unwrap();

        let mut eng_chunked = engine(fs);
        let mut frames_chunked = Vec::new();
        for chunk in x.chunks(37) {
            frames_chunked.extend(eng_chunked.push_block(&[chunk.to_vec()]).unwrap());
        }

        assert_eq!(frames_whole.len(), frames_chunked.len());
        for (a, b) in frames_whole.iter().zip(&frames_chunked) {
            assert_eq!(a.t_end_sec, b.t_end_sec);
            assert_eq!(a.values, b.values);
        }
    }

    #[test]
    fn alpha_tone_concentrates_in_alpha_band() {
        let fs = 256.0;
        let mut eng = engine(fs);
        let frames = eng.push_block(&[sine_block(fs, 10.0, 1024)]).unwrap();
        let last = frames.last().unwrap();
        let bands = default_eeg_bands();
        let alpha_idx = bands.iter().position(|b| b.name == "alpha").unwrap();
        for (bi, row) in last.values.iter().enumerate() {
            if bi != alpha_idx {
                assert!(
                    last.values[alpha_idx][0] > row[0],
                    "alpha should dominate band {bi}"
                );
            }
        }
    }

    #[test]
    fn wrong_channel_count_is_state_violation() {
        let fs = 256.0;
        let mut eng = engine(fs);
        let err = eng
            .push_block(&[sine_block(fs, 10.0, 8), sine_block(fs, 10.0, 8)])
            .unwrap_err();
        assert!(matches!(err, QeegError::StateViolation(_)));
    }
}
