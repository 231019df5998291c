//! Shared window/update framing for the online estimators
//!
//! Every estimator advances one sample at a time; a frame may be emitted
//! when the update interval has elapsed and the analysis window is full.
//! The interval counter keeps its remainder when it fires so the cadence
//! stays phase-stable across irregular chunk sizes.

use qeeg_core::{QeegError, QeegResult, Sample};

/// Minimum analysis window, in samples.
pub const MIN_WINDOW_SAMPLES: usize = 8;

pub(crate) fn sec_to_samples(sec: f64, fs_hz: f64) -> usize {
    if fs_hz <= 0.0 || sec <= 0.0 {
        return 0;
    }
    (sec * fs_hz).round() as usize
}

/// Resolve `(window_samples, update_samples)` from seconds.
///
/// The window is clamped up to [`MIN_WINDOW_SAMPLES`]; the update interval
/// is clamped into `[1, window_samples]`.
pub(crate) fn resolve_window(
    window_seconds: f64,
    update_seconds: f64,
    fs_hz: f64,
) -> QeegResult<(usize, usize)> {
    if !(fs_hz > 0.0) || !fs_hz.is_finite() {
        return Err(QeegError::invalid_param("fs_hz must be > 0"));
    }
    if !(window_seconds > 0.0) {
        return Err(QeegError::invalid_param("window_seconds must be > 0"));
    }
    if !(update_seconds > 0.0) {
        return Err(QeegError::invalid_param("update_seconds must be > 0"));
    }
    let window_samples = sec_to_samples(window_seconds, fs_hz).max(MIN_WINDOW_SAMPLES);
    let update_samples = sec_to_samples(update_seconds, fs_hz)
        .max(1)
        .min(window_samples);
    Ok((window_samples, update_samples))
}

/// Check a pushed block against the estimator's channel layout; returns
/// the per-channel sample count.
///
/// A wrong channel count is a caller state error; ragged channel lengths
/// are an invalid parameter.
pub(crate) fn validate_block(block: &[Vec<Sample>], n_channels: usize) -> QeegResult<usize> {
    if block.len() != n_channels {
        return Err(QeegError::state_violation(format!(
            "push_block: expected {} channels, got {}",
            n_channels,
            block.len()
        )));
    }
    let n = block.first().map_or(0, Vec::len);
    if block.iter().any(|ch| ch.len() != n) {
        return Err(QeegError::invalid_param(
            "push_block: all channels must have the same number of samples",
        ));
    }
    Ok(n)
}

/// Per-sample frame cadence tracker.
#[derive(Debug, Clone)]
pub(crate) struct FrameClock {
    fs_hz: f64,
    update_samples: usize,
    total_samples: u64,
    since_last_update: usize,
}

impl FrameClock {
    pub fn new(fs_hz: f64, update_samples: usize) -> Self {
        Self {
            fs_hz,
            update_samples,
            total_samples: 0,
            since_last_update: 0,
        }
    }

    /// Advance one sample; true when the update interval elapsed.
    ///
    /// The caller still has to check that the window is full before
    /// emitting a frame; skipped emissions do not shift later cadence.
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.total_samples += 1;
        self.since_last_update += 1;
        if self.since_last_update >= self.update_samples {
            self.since_last_update -= self.update_samples;
            true
        } else {
            false
        }
    }

    /// Time of the most recently pushed sample.
    #[inline]
    pub fn t_end_sec(&self) -> f64 {
        self.total_samples as f64 / self.fs_hz
    }
}
