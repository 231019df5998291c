//! The neurofeedback control loop
//!
//! Per metric frame: baseline accumulation until the threshold exists,
//! optional artifact gating, hysteresis reward decision, bounded reward
//! history, adaptive threshold update, continuous feedback value.

use std::collections::VecDeque;

use crate::adapt::{AdaptiveThreshold, AdaptiveThresholdConfig};
use crate::direction::RewardDirection;
use crate::feedback::feedback_value;
use crate::gate::HysteresisGate;
use qeeg_core::stats::median;
use qeeg_core::{QeegError, QeegResult};
use qeeg_online::ArtifactFrame;

/// Queued artifact frames older than the metric frame (beyond the
/// alignment tolerance) are dropped; the queue is additionally capped so a
/// stalled metric stream cannot grow memory unboundedly.
const MAX_ARTIFACT_QUEUE: usize = 1024;

/// Controller configuration; immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NfConfig {
    /// Sampling rate of the stream driving the metric; used only for the
    /// artifact/metric time alignment tolerance (`0.5 / fs`).
    pub fs_hz: f64,
    pub direction: RewardDirection,
    /// Seconds of metric frames accumulated before the initial threshold
    /// is set to their median.
    pub baseline_seconds: f64,
    /// Frame cadence of the metric stream.
    pub update_seconds: f64,
    /// Length of the reward-rate window.
    pub rate_window_seconds: f64,
    /// Hysteresis half-width around the threshold; 0 for strict
    /// comparison.
    pub hysteresis: f64,
    /// Metric delta mapping to full-scale feedback.
    pub feedback_span: f64,
    /// Suppress reward and adaptation while the artifact stream reports a
    /// bad frame (once its baseline is ready).
    pub artifact_gate: bool,
    /// Threshold adaptation; `None` keeps the initial threshold fixed.
    pub adapt: Option<AdaptiveThresholdConfig>,
}

impl Default for NfConfig {
    fn default() -> Self {
        Self {
            fs_hz: 256.0,
            direction: RewardDirection::Above,
            baseline_seconds: 10.0,
            update_seconds: 0.25,
            rate_window_seconds: 5.0,
            hysteresis: 0.0,
            feedback_span: 1.0,
            artifact_gate: false,
            adapt: Some(AdaptiveThresholdConfig::default()),
        }
    }
}

/// One controller decision, emitted per metric frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NfDecision {
    pub t_end_sec: f64,
    pub metric: f64,
    /// `None` while the baseline is still accumulating.
    pub threshold: Option<f64>,
    pub reward: bool,
    pub reward_rate: f64,
    /// The artifact frame that was aligned to this decision, if any.
    pub artifact: Option<ArtifactFrame>,
    pub feedback_value: f64,
}

/// Stateful neurofeedback controller.
#[derive(Debug)]
pub struct NfController {
    cfg: NfConfig,
    threshold: Option<f64>,
    baseline_values: Vec<f64>,
    reward_hist: VecDeque<bool>,
    rate_window_frames: usize,
    gate: HysteresisGate,
    adapt: Option<AdaptiveThreshold>,
    artifact_queue: VecDeque<ArtifactFrame>,
}

impl NfController {
    pub fn new(cfg: NfConfig) -> QeegResult<Self> {
        if !(cfg.fs_hz > 0.0) || !cfg.fs_hz.is_finite() {
            return Err(QeegError::invalid_param("fs_hz must be > 0"));
        }
        if !(cfg.baseline_seconds > 0.0) {
            return Err(QeegError::invalid_param("baseline_seconds must be > 0"));
        }
        if !(cfg.update_seconds > 0.0) {
            return Err(QeegError::invalid_param("update_seconds must be > 0"));
        }
        if !(cfg.rate_window_seconds > 0.0) {
            return Err(QeegError::invalid_param("rate_window_seconds must be > 0"));
        }
        if let Some(adapt) = &cfg.adapt {
            if !(adapt.target_reward_rate > 0.0 && adapt.target_reward_rate < 1.0) {
                return Err(QeegError::invalid_param(
                    "target_reward_rate must be in (0, 1)",
                ));
            }
        }
        let rate_window_frames =
            ((cfg.rate_window_seconds / cfg.update_seconds).round() as usize).max(1);
        Ok(Self {
            gate: HysteresisGate::new(cfg.hysteresis, cfg.direction),
            adapt: cfg.adapt.map(AdaptiveThreshold::new),
            cfg,
            threshold: None,
            baseline_values: Vec::new(),
            reward_hist: VecDeque::new(),
            rate_window_frames,
            artifact_queue: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &NfConfig {
        &self.cfg
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn reward_history_len(&self) -> usize {
        self.reward_hist.len()
    }

    pub fn gate_state(&self) -> bool {
        self.gate.state()
    }

    /// Drop all learned state (threshold, baseline, histories).
    pub fn reset(&mut self) {
        self.threshold = None;
        self.baseline_values.clear();
        self.reward_hist.clear();
        self.gate.reset(false);
        if let Some(adapt) = &mut self.adapt {
            adapt.reset();
        }
        self.artifact_queue.clear();
    }

    /// Queue an artifact frame for alignment with upcoming metric frames.
    pub fn push_artifact_frame(&mut self, frame: ArtifactFrame) {
        self.artifact_queue.push_back(frame);
        while self.artifact_queue.len() > MAX_ARTIFACT_QUEUE {
            self.artifact_queue.pop_front();
        }
    }

    fn reward_rate(&self) -> f64 {
        if self.reward_hist.is_empty() {
            return 0.0;
        }
        let sum = self.reward_hist.iter().filter(|&&r| r).count();
        sum as f64 / self.reward_hist.len() as f64
    }

    /// Pop the artifact frame matching `t_end_sec` within `0.5 / fs`;
    /// stale frames are discarded along the way.
    fn take_artifact(&mut self, t_end_sec: f64) -> Option<ArtifactFrame> {
        let tol = 0.5 / self.cfg.fs_hz;
        while let Some(front) = self.artifact_queue.front() {
            if front.t_end_sec < t_end_sec - tol {
                self.artifact_queue.pop_front();
                continue;
            }
            if (front.t_end_sec - t_end_sec).abs() <= tol {
                return self.artifact_queue.pop_front();
            }
            // Front frame is in the future: keep it for later.
            return None;
        }
        None
    }

    /// Advance the controller by one metric frame.
    pub fn process(&mut self, t_end_sec: f64, metric: f64) -> NfDecision {
        let artifact = self.take_artifact(t_end_sec);

        let decision = |threshold: Option<f64>, reward: bool, rr: f64, feedback: f64| NfDecision {
            t_end_sec,
            metric,
            threshold,
            reward,
            reward_rate: rr,
            artifact,
            feedback_value: feedback,
        };

        // Undefined metric: no decision, no state changes.
        if !metric.is_finite() {
            return decision(self.threshold, false, self.reward_rate(), 0.0);
        }

        // Baseline phase: accumulate, then set the initial threshold.
        if self.threshold.is_none() {
            if t_end_sec <= self.cfg.baseline_seconds {
                self.baseline_values.push(metric);
            } else {
                let mut thr = median(&self.baseline_values);
                if !thr.is_finite() {
                    thr = metric;
                }
                self.threshold = Some(thr);
                log::debug!(
                    "initial threshold set to {thr} (baseline {}s, n={})",
                    self.cfg.baseline_seconds,
                    self.baseline_values.len()
                );
            }
            return decision(self.threshold, false, 0.0, 0.0);
        }
        let threshold = self.threshold.unwrap();

        // Artifact gating: reward is withheld and nothing adapts.
        let gated = self.cfg.artifact_gate
            && artifact.map(|a| a.baseline_ready && a.bad).unwrap_or(false);
        if gated {
            return decision(Some(threshold), false, self.reward_rate(), 0.0);
        }

        // Reward decision through the hysteresis gate.
        let reward = self.gate.update(metric, threshold);

        self.reward_hist.push_back(reward);
        while self.reward_hist.len() > self.rate_window_frames {
            self.reward_hist.pop_front();
        }
        let rr = self.reward_rate();

        if let Some(adapt) = &mut self.adapt {
            adapt.observe(t_end_sec, metric);
            let next = adapt.update(threshold, rr, t_end_sec);
            self.threshold = Some(next);
        }
        let current = self.threshold.unwrap();

        let feedback = feedback_value(metric, current, self.cfg.direction, self.cfg.feedback_span);
        decision(Some(current), reward, rr, feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::AdaptMode;

    fn config(adapt: Option<AdaptiveThresholdConfig>) -> NfConfig {
        NfConfig {
            fs_hz: 100.0,
            direction: RewardDirection::Above,
            baseline_seconds: 1.0,
            update_seconds: 0.25,
            rate_window_seconds: 1.0,
            hysteresis: 0.0,
            feedback_span: 1.0,
            artifact_gate: true,
            adapt,
        }
    }

    fn drive_past_baseline(ctl: &mut NfController) {
        // Frames at t = 0.25 .. 1.0 accumulate; t = 1.25 sets the
        // threshold to their median (1.0).
        for i in 1..=4 {
            let d = ctl.process(0.25 * i as f64, 1.0);
            assert!(!d.reward);
            assert!(d.threshold.is_none());
        }
        let d = ctl.process(1.25, 1.0);
        assert_eq!(d.threshold, Some(1.0));
        assert!(!d.reward);
    }

    #[test]
    fn baseline_median_becomes_threshold() {
        let mut ctl = NfController::new(config(None)).unwrap();
        drive_past_baseline(&mut ctl);
        assert_eq!(ctl.threshold(), Some(1.0));
    }

    #[test]
    fn rewards_flow_after_baseline() {
        let mut ctl = NfController::new(config(None)).unwrap();
        drive_past_baseline(&mut ctl);
        let d = ctl.process(1.5, 2.0);
        assert!(d.reward);
        assert_eq!(d.reward_rate, 1.0);
        assert_eq!(d.feedback_value, 1.0);
        let d = ctl.process(1.75, 0.5);
        assert!(!d.reward);
        assert_eq!(d.reward_rate, 0.5);
    }

    #[test]
    fn nan_metric_leaves_state_untouched() {
        let mut ctl = NfController::new(config(None)).unwrap();
        drive_past_baseline(&mut ctl);
        ctl.process(1.5, 2.0);
        let hist = ctl.reward_history_len();
        let thr = ctl.threshold();
        let d = ctl.process(1.75, f64::NAN);
        assert!(!d.reward);
        assert_eq!(d.feedback_value, 0.0);
        assert_eq!(ctl.reward_history_len(), hist);
        assert_eq!(ctl.threshold(), thr);
    }

    #[test]
    fn artifact_gate_freezes_everything() {
        let mut ctl = NfController::new(config(Some(AdaptiveThresholdConfig {
            mode: AdaptMode::Exponential,
            ..Default::default()
        })))
        .unwrap();
        drive_past_baseline(&mut ctl);
        ctl.process(1.5, 2.0);

        let hist = ctl.reward_history_len();
        let thr = ctl.threshold();
        let gate_state = ctl.gate_state();

        ctl.push_artifact_frame(ArtifactFrame {
            t_end_sec: 1.75,
            baseline_ready: true,
            bad: true,
            bad_channel_count: 2,
            ..Default::default()
        });
        let d = ctl.process(1.75, 5.0);
        assert!(!d.reward);
        assert_eq!(d.feedback_value, 0.0);
        assert!(d.artifact.unwrap().bad);
        // History, threshold and hysteresis state unchanged.
        assert_eq!(ctl.reward_history_len(), hist);
        assert_eq!(ctl.threshold(), thr);
        assert_eq!(ctl.gate_state(), gate_state);
    }

    #[test]
    fn artifact_before_baseline_ready_does_not_gate() {
        let mut ctl = NfController::new(config(None)).unwrap();
        drive_past_baseline(&mut ctl);
        ctl.push_artifact_frame(ArtifactFrame {
            t_end_sec: 1.5,
            baseline_ready: false,
            bad: true,
            ..Default::default()
        });
        let d = ctl.process(1.5, 2.0);
        assert!(d.reward, "gate must ignore artifact frames before readiness");
    }

    #[test]
    fn stale_artifact_frames_are_dropped() {
        let mut ctl = NfController::new(config(None)).unwrap();
        drive_past_baseline(&mut ctl);
        // Two stale frames and one aligned frame.
        for t in [1.0, 1.25] {
            ctl.push_artifact_frame(ArtifactFrame {
                t_end_sec: t,
                baseline_ready: true,
                bad: true,
                ..Default::default()
            });
        }
        ctl.push_artifact_frame(ArtifactFrame {
            t_end_sec: 1.5,
            baseline_ready: true,
            bad: false,
            ..Default::default()
        });
        let d = ctl.process(1.5, 2.0);
        let af = d.artifact.unwrap();
        assert_eq!(af.t_end_sec, 1.5);
        assert!(!af.bad);
        assert!(d.reward);
    }

    #[test]
    fn exponential_adaptation_raises_threshold_under_constant_reward() {
        let mut ctl = NfController::new(config(Some(AdaptiveThresholdConfig {
            mode: AdaptMode::Exponential,
            reward_direction: RewardDirection::Above,
            target_reward_rate: 0.6,
            eta: 0.1,
            ..Default::default()
        })))
        .unwrap();
        drive_past_baseline(&mut ctl);
        let mut t = 1.5;
        for _ in 0..20 {
            ctl.process(t, 2.0);
            t += 0.25;
        }
        assert!(ctl.threshold().unwrap() > 1.0);
    }

    #[test]
    fn reward_history_is_bounded() {
        let mut ctl = NfController::new(config(None)).unwrap();
        drive_past_baseline(&mut ctl);
        let mut t = 1.5;
        for _ in 0..50 {
            ctl.process(t, 2.0);
            t += 0.25;
        }
        // rate_window = 1.0 s / 0.25 s = 4 frames.
        assert_eq!(ctl.reward_history_len(), 4);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut cfg = config(None);
        cfg.baseline_seconds = 0.0;
        assert!(NfController::new(cfg).is_err());

        let mut cfg = config(Some(AdaptiveThresholdConfig {
            target_reward_rate: 1.5,
            ..Default::default()
        }));
        cfg.baseline_seconds = 1.0;
        assert!(NfController::new(cfg).is_err());
    }
}
