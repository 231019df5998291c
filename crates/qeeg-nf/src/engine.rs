//! Metric engine: one online estimator reduced to a scalar stream
//!
//! The engine owns whichever windowed estimator the metric spec calls for
//! and reduces each of its frames to a single value for the controller.

use crate::metric::{MetricSmoother, MetricSpec};
use qeeg_core::{
    BandDefinition, QeegError, QeegResult, Sample, find_channel_index, resolve_band_token,
};
use qeeg_connect::pac::PacOptions;
use qeeg_dsp::welch::WelchOptions;
use qeeg_online::{
    OnlineBandpower, OnlineBandpowerOptions, OnlineCoherence, OnlineCoherenceOptions, OnlinePac,
    OnlinePacOptions,
};

/// Epsilon added to ratio and asymmetry denominators.
pub const METRIC_EPS: f64 = 1e-12;

/// Timing and estimator settings shared by every metric type.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricEngineOptions {
    pub window_seconds: f64,
    pub update_seconds: f64,
    /// Welch settings for band power and coherence metrics.
    pub welch: WelchOptions,
    /// PAC settings for `pac:`/`mvl:` metrics.
    pub pac: PacOptions,
    /// Moving-average smoothing of the metric stream; 0 disables.
    pub smooth_seconds: f64,
}

impl Default for MetricEngineOptions {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            update_seconds: 0.25,
            welch: WelchOptions::default(),
            pac: PacOptions {
                zero_phase: false,
                ..Default::default()
            },
            smooth_seconds: 0.0,
        }
    }
}

/// One scalar metric sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricFrame {
    pub t_end_sec: f64,
    pub value: f64,
}

#[derive(Debug)]
enum Inner {
    /// Band power; the estimator carries exactly the bands the reducer
    /// needs, resolved up front.
    Band {
        eng: OnlineBandpower,
        channel: usize,
    },
    Ratio {
        eng: OnlineBandpower,
        channel: usize,
    },
    Asymmetry {
        eng: OnlineBandpower,
        channel_a: usize,
        channel_b: usize,
    },
    Coherence {
        eng: OnlineCoherence,
    },
    Pac {
        eng: OnlinePac,
        channel: usize,
    },
}

/// Drives the estimator selected by a [`MetricSpec`] and emits scalar
/// frames.
#[derive(Debug)]
pub struct MetricEngine {
    inner: Inner,
    smoother: MetricSmoother,
}

impl MetricEngine {
    pub fn new(
        spec: &MetricSpec,
        channel_names: &[String],
        fs_hz: f64,
        bands: &[BandDefinition],
        opt: &MetricEngineOptions,
    ) -> QeegResult<Self> {
        let channel = |name: &str| -> QeegResult<usize> {
            find_channel_index(channel_names, name).ok_or_else(|| {
                QeegError::invalid_param(format!("metric channel not found in recording: {name}"))
            })
        };

        let bp_options = OnlineBandpowerOptions {
            window_seconds: opt.window_seconds,
            update_seconds: opt.update_seconds,
            welch: opt.welch,
        };

        let inner = match spec {
            MetricSpec::Band { band, channel: ch } => Inner::Band {
                eng: OnlineBandpower::new(
                    channel_names.to_vec(),
                    fs_hz,
                    vec![resolve_band_token(bands, band, "metric")?],
                    bp_options,
                )?,
                channel: channel(ch)?,
            },
            MetricSpec::Ratio {
                band_num,
                band_den,
                channel: ch,
            } => Inner::Ratio {
                eng: OnlineBandpower::new(
                    channel_names.to_vec(),
                    fs_hz,
                    vec![
                        resolve_band_token(bands, band_num, "numerator")?,
                        resolve_band_token(bands, band_den, "denominator")?,
                    ],
                    bp_options,
                )?,
                channel: channel(ch)?,
            },
            MetricSpec::Asymmetry {
                band,
                channel_a,
                channel_b,
            } => Inner::Asymmetry {
                eng: OnlineBandpower::new(
                    channel_names.to_vec(),
                    fs_hz,
                    vec![resolve_band_token(bands, band, "metric")?],
                    bp_options,
                )?,
                channel_a: channel(channel_a)?,
                channel_b: channel(channel_b)?,
            },
            MetricSpec::Coherence {
                measure,
                band,
                channel_a,
                channel_b,
            } => {
                let a = channel(channel_a)?;
                let b = channel(channel_b)?;
                if a == b {
                    return Err(QeegError::invalid_param(
                        "coherence metric requires two different channels",
                    ));
                }
                Inner::Coherence {
                    eng: OnlineCoherence::new(
                        channel_names.to_vec(),
                        fs_hz,
                        vec![resolve_band_token(bands, band, "metric")?],
                        vec![(a, b)],
                        OnlineCoherenceOptions {
                            window_seconds: opt.window_seconds,
                            update_seconds: opt.update_seconds,
                            measure: *measure,
                            welch: opt.welch,
                        },
                    )?,
                }
            }
            MetricSpec::Pac {
                method,
                phase_band,
                amp_band,
                channel: ch,
            } => Inner::Pac {
                eng: OnlinePac::new(
                    fs_hz,
                    resolve_band_token(bands, phase_band, "phase")?,
                    resolve_band_token(bands, amp_band, "amplitude")?,
                    OnlinePacOptions {
                        window_seconds: opt.window_seconds,
                        update_seconds: opt.update_seconds,
                        pac: PacOptions {
                            method: *method,
                            ..opt.pac
                        },
                    },
                )?,
                channel: channel(ch)?,
            },
        };

        Ok(Self {
            inner,
            smoother: MetricSmoother::new(opt.smooth_seconds, opt.update_seconds),
        })
    }

    /// Push a channel-major block and collect metric frames.
    pub fn push_block(&mut self, block: &[Vec<Sample>]) -> QeegResult<Vec<MetricFrame>> {
        let mut out = Vec::new();
        match &mut self.inner {
            Inner::Band { eng, channel } => {
                for fr in eng.push_block(block)? {
                    out.push(MetricFrame {
                        t_end_sec: fr.t_end_sec,
                        value: fr.values[0][*channel],
                    });
                }
            }
            Inner::Ratio { eng, channel } => {
                for fr in eng.push_block(block)? {
                    let num = fr.values[0][*channel];
                    let den = fr.values[1][*channel];
                    out.push(MetricFrame {
                        t_end_sec: fr.t_end_sec,
                        value: (num + METRIC_EPS) / (den + METRIC_EPS),
                    });
                }
            }
            Inner::Asymmetry {
                eng,
                channel_a,
                channel_b,
            } => {
                for fr in eng.push_block(block)? {
                    let pa = fr.values[0][*channel_a];
                    let pb = fr.values[0][*channel_b];
                    out.push(MetricFrame {
                        t_end_sec: fr.t_end_sec,
                        value: ((pa + METRIC_EPS) / (pb + METRIC_EPS)).log10(),
                    });
                }
            }
            Inner::Coherence { eng } => {
                for fr in eng.push_block(block)? {
                    out.push(MetricFrame {
                        t_end_sec: fr.t_end_sec,
                        value: fr.values[0][0],
                    });
                }
            }
            Inner::Pac { eng, channel } => {
                let ch = block.get(*channel).ok_or_else(|| {
                    QeegError::state_violation("push_block: PAC channel missing from block")
                })?;
                for fr in eng.push_block(ch)? {
                    out.push(MetricFrame {
                        t_end_sec: fr.t_end_sec,
                        value: fr.value,
                    });
                }
            }
        }

        for fr in &mut out {
            fr.value = self.smoother.smooth(fr.value);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    use qeeg_core::default_eeg_bands;

    fn names() -> Vec<String> {
        vec!["F3".into(), "F4".into()]
    }

    fn tone(fs: f64, f0: f64, amp: f64, n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| (amp * (2.0 * PI * f0 * i as f64 / fs).sin()) as f32)
            .collect()
    }

    fn opts() -> MetricEngineOptions {
        MetricEngineOptions {
            window_seconds: 2.0,
            update_seconds: 0.25,
            welch: WelchOptions {
                nperseg: 256,
                overlap_fraction: 0.5,
            },
            ..Default::default()
        }
    }

    #[test]
    fn band_metric_tracks_alpha_power() {
        let fs = 256.0;
        let spec = MetricSpec::parse("alpha:F3").unwrap();
        let mut eng =
            MetricEngine::new(&spec, &names(), fs, &default_eeg_bands(), &opts()).unwrap();
        let frames = eng
            .push_block(&[tone(fs, 10.0, 1.0, 1024), tone(fs, 10.0, 0.1, 1024)])
            .unwrap();
        assert!(!frames.is_empty());
        assert!(frames.last().unwrap().value > 0.0);
    }

    #[test]
    fn ratio_of_identical_bands_is_one() {
        let fs = 256.0;
        let spec = MetricSpec::parse("ratio:alpha:alpha:F3").unwrap();
        let mut eng =
            MetricEngine::new(&spec, &names(), fs, &default_eeg_bands(), &opts()).unwrap();
        let frames = eng
            .push_block(&[tone(fs, 10.0, 1.0, 1024), tone(fs, 10.0, 1.0, 1024)])
            .unwrap();
        let v = frames.last().unwrap().value;
        assert!((v - 1.0).abs() < 1e-9, "ratio = {v}");
    }

    #[test]
    fn asymmetry_sign_follows_stronger_channel() {
        let fs = 256.0;
        let spec = MetricSpec::parse("asym:alpha:F4:F3").unwrap();
        let mut eng =
            MetricEngine::new(&spec, &names(), fs, &default_eeg_bands(), &opts()).unwrap();
        // F4 (channel_a) gets the stronger alpha tone.
        let frames = eng
            .push_block(&[tone(fs, 10.0, 0.2, 1024), tone(fs, 10.0, 2.0, 1024)])
            .unwrap();
        assert!(frames.last().unwrap().value > 0.0);

        // Symmetric power gives ~0 asymmetry.
        let mut eng2 =
            MetricEngine::new(&spec, &names(), fs, &default_eeg_bands(), &opts()).unwrap();
        let frames2 = eng2
            .push_block(&[tone(fs, 10.0, 1.0, 1024), tone(fs, 10.0, 1.0, 1024)])
            .unwrap();
        assert!(frames2.last().unwrap().value.abs() < 1e-6);
    }

    #[test]
    fn explicit_range_band_is_accepted() {
        let fs = 256.0;
        let spec = MetricSpec::parse("band:9-11:F3").unwrap();
        let mut eng =
            MetricEngine::new(&spec, &names(), fs, &default_eeg_bands(), &opts()).unwrap();
        let frames = eng
            .push_block(&[tone(fs, 10.0, 1.0, 1024), tone(fs, 10.0, 1.0, 1024)])
            .unwrap();
        assert!(frames.last().unwrap().value > 0.0);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let spec = MetricSpec::parse("alpha:Oz").unwrap();
        assert!(MetricEngine::new(&spec, &names(), 256.0, &default_eeg_bands(), &opts()).is_err());
    }

    #[test]
    fn coherence_same_channel_rejected() {
        let spec = MetricSpec::parse("coh:alpha:F3:F3").unwrap();
        assert!(MetricEngine::new(&spec, &names(), 256.0, &default_eeg_bands(), &opts()).is_err());
    }
}
