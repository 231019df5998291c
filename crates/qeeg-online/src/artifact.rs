//! Windowed artifact detection against a robust baseline
//!
//! Each frame summarizes every channel's window with peak-to-peak, RMS and
//! excess kurtosis. The first `baseline_seconds` of valid frames feed a
//! baseline-only store; afterwards a channel is flagged when any summary
//! deviates from its baseline median by more than `z` robust sigmas
//! (median absolute deviation scaled by 1.4826).

use crate::framing::{FrameClock, resolve_window, validate_block};
use crate::ring::RingBuffer;
use qeeg_core::stats::{mad_sigma, median};
use qeeg_core::{QeegError, QeegResult, Sample};

/// Options for [`ArtifactDetector`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArtifactOptions {
    pub window_seconds: f64,
    pub update_seconds: f64,
    /// Length of the baseline period used to learn per-channel statistics.
    pub baseline_seconds: f64,
    /// Robust-z threshold on peak-to-peak; <= 0 disables the criterion.
    pub ptp_z: f64,
    /// Robust-z threshold on RMS; <= 0 disables the criterion.
    pub rms_z: f64,
    /// Robust-z threshold on excess kurtosis; <= 0 disables the criterion.
    pub kurtosis_z: f64,
    /// A frame is bad when at least this many channels are flagged.
    pub min_bad_channels: usize,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            update_seconds: 0.25,
            baseline_seconds: 10.0,
            ptp_z: 6.0,
            rms_z: 6.0,
            kurtosis_z: 6.0,
            min_bad_channels: 1,
        }
    }
}

/// One artifact verdict, aligned to the NF frame cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArtifactFrame {
    pub t_end_sec: f64,
    /// Baseline statistics have been learned; verdicts before this are
    /// always clean.
    pub baseline_ready: bool,
    pub bad: bool,
    pub bad_channel_count: usize,
    pub max_ptp_z: f64,
    pub max_rms_z: f64,
    pub max_kurtosis_z: f64,
}

/// Per-channel window summaries.
#[derive(Debug, Clone, Copy)]
struct Summaries {
    ptp: f64,
    rms: f64,
    kurtosis: f64,
}

fn window_summaries(window: &[Sample]) -> Option<Summaries> {
    if window.is_empty() {
        return None;
    }
    let n = window.len() as f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for &v in window {
        let x = v as f64;
        if !x.is_finite() {
            return None;
        }
        min = min.min(x);
        max = max.max(x);
        sum += x;
        sum_sq += x * x;
    }
    let mean = sum / n;
    let m2 = (sum_sq / n - mean * mean).max(0.0);
    let mut m4 = 0.0;
    for &v in window {
        let d = v as f64 - mean;
        m4 += d * d * d * d;
    }
    m4 /= n;
    let kurtosis = if m2 > 1e-24 { m4 / (m2 * m2) - 3.0 } else { 0.0 };
    Some(Summaries {
        ptp: max - min,
        rms: (sum_sq / n).sqrt(),
        kurtosis,
    })
}

#[derive(Debug, Default, Clone)]
struct BaselineStore {
    ptp: Vec<f64>,
    rms: Vec<f64>,
    kurtosis: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
struct RobustStats {
    median: f64,
    sigma: f64,
}

impl RobustStats {
    fn from_values(values: &[f64]) -> Self {
        Self {
            median: median(values),
            sigma: mad_sigma(values),
        }
    }

    fn z(&self, value: f64) -> f64 {
        let dev = (value - self.median).abs();
        if self.sigma > 1e-12 {
            dev / self.sigma
        } else if dev <= 1e-12 {
            0.0
        } else {
            f64::INFINITY
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ChannelStats {
    ptp: RobustStats,
    rms: RobustStats,
    kurtosis: RobustStats,
}

/// Windowed artifact detector running on the NF frame cadence.
#[derive(Debug)]
pub struct ArtifactDetector {
    channel_names: Vec<String>,
    opt: ArtifactOptions,
    clock: FrameClock,
    rings: Vec<RingBuffer>,
    scratch: Vec<Sample>,
    baseline: Vec<BaselineStore>,
    stats: Option<Vec<ChannelStats>>,
}

impl ArtifactDetector {
    pub fn new(
        channel_names: Vec<String>,
        fs_hz: f64,
        opt: ArtifactOptions,
    ) -> QeegResult<Self> {
        if channel_names.is_empty() {
            return Err(QeegError::invalid_param("need at least 1 channel"));
        }
        if opt.min_bad_channels == 0 {
            return Err(QeegError::invalid_param("min_bad_channels must be >= 1"));
        }
        if !(opt.baseline_seconds > 0.0) {
            return Err(QeegError::invalid_param("baseline_seconds must be > 0"));
        }
        let (window_samples, update_samples) =
            resolve_window(opt.window_seconds, opt.update_seconds, fs_hz)?;
        let rings = channel_names
            .iter()
            .map(|_| RingBuffer::with_capacity(window_samples))
            .collect::<QeegResult<Vec<_>>>()?;
        let baseline = vec![BaselineStore::default(); channel_names.len()];
        Ok(Self {
            channel_names,
            opt,
            clock: FrameClock::new(fs_hz, update_samples),
            rings,
            scratch: Vec::new(),
            baseline,
            stats: None,
        })
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn baseline_ready(&self) -> bool {
        self.stats.is_some()
    }

    /// Drop learned statistics and start a fresh baseline.
    pub fn reset_baseline(&mut self) {
        self.stats = None;
        for store in &mut self.baseline {
            store.ptp.clear();
            store.rms.clear();
            store.kurtosis.clear();
        }
    }

    pub fn push_block(&mut self, block: &[Vec<Sample>]) -> QeegResult<Vec<ArtifactFrame>> {
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

    fn compute_frame(&mut self) -> ArtifactFrame {
        let t_end_sec = self.clock.t_end_sec();
        let n_ch = self.rings.len();

        let mut scratch = std::mem::take(&mut self.scratch);
        let summaries: Vec<Option<Summaries>> = (0..n_ch)
            .map(|c| {
                self.rings[c].extract_into(&mut scratch);
                window_summaries(&scratch)
            })
            .collect();
        self.scratch = scratch;

        // Baseline learning phase.
        if self.stats.is_none() {
            if t_end_sec <= self.opt.baseline_seconds {
                if summaries.iter().all(Option::is_some) {
                    for (store, s) in self.baseline.iter_mut().zip(&summaries) {
                        let s = s.as_ref().unwrap();
                        store.ptp.push(s.ptp);
                        store.rms.push(s.rms);
                        store.kurtosis.push(s.kurtosis);
                    }
                }
            } else if self.baseline.iter().all(|s| !s.ptp.is_empty()) {
                self.stats = Some(
                    self.baseline
                        .iter()
                        .map(|s| ChannelStats {
                            ptp: RobustStats::from_values(&s.ptp),
                            rms: RobustStats::from_values(&s.rms),
                            kurtosis: RobustStats::from_values(&s.kurtosis),
                        })
                        .collect(),
                );
                log::debug!(
                    "artifact baseline ready at t={t_end_sec:.2}s ({} frames/channel)",
                    self.baseline[0].ptp.len()
                );
            }
        }

        let Some(stats) = &self.stats else {
            return ArtifactFrame {
                t_end_sec,
                ..Default::default()
            };
        };

        let mut bad_channel_count = 0usize;
        let mut max_ptp_z = 0.0f64;
        let mut max_rms_z = 0.0f64;
        let mut max_kurtosis_z = 0.0f64;

        for (s, st) in summaries.iter().zip(stats) {
            let Some(s) = s else {
                // A window containing non-finite samples is itself bad.
                bad_channel_count += 1;
                continue;
            };
            let zp = st.ptp.z(s.ptp);
            let zr = st.rms.z(s.rms);
            let zk = st.kurtosis.z(s.kurtosis);
            max_ptp_z = max_ptp_z.max(zp);
            max_rms_z = max_rms_z.max(zr);
            max_kurtosis_z = max_kurtosis_z.max(zk);

            let hit = (self.opt.ptp_z > 0.0 && zp > self.opt.ptp_z)
                || (self.opt.rms_z > 0.0 && zr > self.opt.rms_z)
                || (self.opt.kurtosis_z > 0.0 && zk > self.opt.kurtosis_z);
            if hit {
                bad_channel_count += 1;
            }
        }

        ArtifactFrame {
            t_end_sec,
            baseline_ready: true,
            bad: bad_channel_count >= self.opt.min_bad_channels,
            bad_channel_count,
            max_ptp_z,
            max_rms_z,
            max_kurtosis_z,
        }
    }
}
