//! Multi-channel recordings and annotation events

use crate::error::{QeegError, QeegResult};
use crate::Sample;

/// A timestamped annotation attached to a recording.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationEvent {
    /// Onset in seconds from the start of the recording (>= 0).
    pub onset_sec: f64,
    /// Duration in seconds (>= 0; 0 for instantaneous markers).
    pub duration_sec: f64,
    /// Free-form event text.
    pub text: String,
}

/// An in-memory multi-channel recording.
///
/// Channels are stored channel-major (`data[channel][sample]`); all channels
/// have the same length. Constructed by external readers, consumed here by
/// borrowed view.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub fs_hz: f64,
    pub channel_names: Vec<String>,
    pub data: Vec<Vec<Sample>>,
    pub events: Vec<AnnotationEvent>,
}

impl Recording {
    /// Build a recording and check the shape invariants of the data model:
    /// positive sampling rate, one name per channel, names unique after
    /// lowercase normalization, and all channels of equal length.
    pub fn new(
        fs_hz: f64,
        channel_names: Vec<String>,
        data: Vec<Vec<Sample>>,
    ) -> QeegResult<Self> {
        if !(fs_hz > 0.0) || !fs_hz.is_finite() {
            return Err(QeegError::invalid_param(format!(
                "fs_hz must be > 0 (got {fs_hz})"
            )));
        }
        if channel_names.len() != data.len() {
            return Err(QeegError::invalid_param(format!(
                "channel name count ({}) != channel count ({})",
                channel_names.len(),
                data.len()
            )));
        }
        let mut seen: Vec<String> = Vec::with_capacity(channel_names.len());
        for name in &channel_names {
            let key = name.trim().to_lowercase();
            if seen.contains(&key) {
                return Err(QeegError::invalid_param(format!(
                    "duplicate channel name after normalization: {name}"
                )));
            }
            seen.push(key);
        }
        if let Some(first) = data.first() {
            let n = first.len();
            if data.iter().any(|ch| ch.len() != n) {
                return Err(QeegError::invalid_param(
                    "all channels must have the same number of samples",
                ));
            }
        }
        Ok(Self {
            fs_hz,
            channel_names,
            data,
            events: Vec::new(),
        })
    }

    pub fn with_events(mut self, events: Vec<AnnotationEvent>) -> QeegResult<Self> {
        for ev in &events {
            if !(ev.onset_sec >= 0.0) || !(ev.duration_sec >= 0.0) {
                return Err(QeegError::invalid_param(
                    "event onset and duration must be >= 0",
                ));
            }
        }
        self.events = events;
        Ok(self)
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    /// Duration of the recording in seconds.
    #[inline]
    pub fn duration_sec(&self) -> f64 {
        self.n_samples() as f64 / self.fs_hz
    }

    /// Borrowed view of one channel.
    #[inline]
    pub fn channel(&self, idx: usize) -> Option<&[Sample]> {
        self.data.get(idx).map(Vec::as_slice)
    }
}

/// Case-insensitive channel lookup; returns the channel index or `None`.
pub fn find_channel_index(channel_names: &[String], name: &str) -> Option<usize> {
    let target = name.trim().to_lowercase();
    channel_names
        .iter()
        .position(|c| c.trim().to_lowercase() == target)
}
