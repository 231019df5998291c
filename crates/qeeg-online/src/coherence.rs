//! Online windowed coherence over channel pairs

use crate::framing::{FrameClock, resolve_window, validate_block};
use crate::ring::RingBuffer;
use qeeg_core::{BandDefinition, QeegError, QeegResult, Sample, default_eeg_bands};
use qeeg_connect::coherence::{CoherenceMeasure, band_average_band, coherence_spectrum};
use qeeg_dsp::welch::WelchOptions;

/// Options for [`OnlineCoherence`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OnlineCoherenceOptions {
    pub window_seconds: f64,
    pub update_seconds: f64,
    pub measure: CoherenceMeasure,
    /// Welch settings; `nperseg` is clamped to the window length.
    pub welch: WelchOptions,
}

impl Default for OnlineCoherenceOptions {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            update_seconds: 0.25,
            measure: CoherenceMeasure::MagnitudeSquared,
            welch: WelchOptions::default(),
        }
    }
}

/// One coherence frame; `values[band_index][pair_index]`.
#[derive(Debug, Clone)]
pub struct CoherenceFrame {
    pub t_end_sec: f64,
    pub measure: CoherenceMeasure,
    pub values: Vec<Vec<f64>>,
}

pub(crate) fn validate_pairs(pairs: &[(usize, usize)], n_channels: usize) -> QeegResult<()> {
    if pairs.is_empty() {
        return Err(QeegError::invalid_param("need at least 1 channel pair"));
    }
    for &(a, b) in pairs {
        if a >= n_channels || b >= n_channels {
            return Err(QeegError::invalid_param("pair index out of range"));
        }
        if a == b {
            return Err(QeegError::invalid_param("pair channels must be different"));
        }
    }
    Ok(())
}

pub(crate) fn pair_names(channel_names: &[String], pairs: &[(usize, usize)]) -> Vec<String> {
    pairs
        .iter()
        .map(|&(a, b)| format!("{}-{}", channel_names[a], channel_names[b]))
        .collect()
}

/// Online/windowed Welch coherence engine.
#[derive(Debug)]
pub struct OnlineCoherence {
    channel_names: Vec<String>,
    fs_hz: f64,
    bands: Vec<BandDefinition>,
    pairs: Vec<(usize, usize)>,
    pair_names: Vec<String>,
    opt: OnlineCoherenceOptions,
    window_samples: usize,
    clock: FrameClock,
    rings: Vec<RingBuffer>,
    scratch_a: Vec<Sample>,
    scratch_b: Vec<Sample>,
}

impl OnlineCoherence {
    pub fn new(
        channel_names: Vec<String>,
        fs_hz: f64,
        bands: Vec<BandDefinition>,
        pairs: Vec<(usize, usize)>,
        opt: OnlineCoherenceOptions,
    ) -> QeegResult<Self> {
        if channel_names.is_empty() {
            return Err(QeegError::invalid_param("need at least 1 channel"));
        }
        validate_pairs(&pairs, channel_names.len())?;
        let bands = if bands.is_empty() { default_eeg_bands() } else { bands };
        let (window_samples, update_samples) =
            resolve_window(opt.window_seconds, opt.update_seconds, fs_hz)?;
        let rings = channel_names
            .iter()
            .map(|_| RingBuffer::with_capacity(window_samples))
            .collect::<QeegResult<Vec<_>>>()?;
        let pair_names = pair_names(&channel_names, &pairs);

        Ok(Self {
            channel_names,
            fs_hz,
            bands,
            pairs,
            pair_names,
            opt,
            window_samples,
            clock: FrameClock::new(fs_hz, update_samples),
            rings,
            scratch_a: Vec::with_capacity(window_samples),
            scratch_b: Vec::with_capacity(window_samples),
        })
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn bands(&self) -> &[BandDefinition] {
        &self.bands
    }

    pub fn pair_names(&self) -> &[String] {
        &self.pair_names
    }

    pub fn push_block(&mut self, block: &[Vec<Sample>]) -> QeegResult<Vec<CoherenceFrame>> {
        let n = validate_block(block, self.rings.len())?;
        let mut frames = Vec::new();
        for i in 0..n {
            for (ring, ch) in self.rings.iter_mut().zip(block) {
                ring.push(ch[i]);
            }
            if self.clock.tick() && self.rings.iter().all(RingBuffer::is_full) {
                frames.push(self.compute_frame());
            }
        }
        Ok(frames)
    }

    fn compute_frame(&mut self) -> CoherenceFrame {
        let welch = WelchOptions {
            nperseg: self.opt.welch.nperseg.min(self.window_samples).max(8),
            overlap_fraction: self.opt.welch.overlap_fraction,
        };

        let mut values = vec![vec![f64::NAN; self.pairs.len()]; self.bands.len()];
        let mut scratch_a = std::mem::take(&mut self.scratch_a);
        let mut scratch_b = std::mem::take(&mut self.scratch_b);

        for (pi, &(a, b)) in self.pairs.iter().enumerate() {
            self.rings[a].extract_into(&mut scratch_a);
            self.rings[b].extract_into(&mut scratch_b);
            let spec = coherence_spectrum(&scratch_a, &scratch_b, self.fs_hz, &welch, self.opt.measure);
            if let Ok(spec) = spec {
                for (bi, band) in self.bands.iter().enumerate() {
                    values[bi][pi] = band_average_band(&spec, band);
                }
            }
        }

        self.scratch_a = scratch_a;
        self.scratch_b = scratch_b;

        CoherenceFrame {
            t_end_sec: self.clock.t_end_sec(),
            measure: self.opt.measure,
            values,
        }
    }
}
