//! Adaptive threshold controller
//!
//! Two modes:
//! - `Exponential`: multiplicative controller on the reward-rate error,
//!   `thr *= exp(eta * (rr - target))`.
//! - `Quantile`: track a rolling window of recent metric values and blend
//!   the threshold toward the empirical quantile implied by the target
//!   reward rate (`1 - target` for reward-above, `target` for
//!   reward-below).

use std::collections::VecDeque;

use crate::direction::{RewardDirection, adapt_threshold};
use qeeg_core::stats::quantile_inplace;
use qeeg_core::{QeegError, QeegResult};

/// Threshold adaptation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AdaptMode {
    Exponential,
    Quantile,
}

impl AdaptMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Exponential => "exp",
            Self::Quantile => "quantile",
        }
    }

    pub fn parse(s: &str) -> QeegResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "exp" | "exponential" | "mul" | "multiplicative" => Ok(Self::Exponential),
            "quantile" | "pct" | "percentile" | "q" => Ok(Self::Quantile),
            other => Err(QeegError::invalid_param(format!(
                "invalid adapt mode: '{other}' (expected 'exp' or 'quantile')"
            ))),
        }
    }
}

/// Configuration for [`AdaptiveThreshold`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdaptiveThresholdConfig {
    pub mode: AdaptMode,
    pub reward_direction: RewardDirection,
    pub target_reward_rate: f64,
    /// Exponential: controller gain. Quantile: blend factor, clamped into
    /// [0, 1].
    pub eta: f64,
    /// Minimum seconds between threshold updates; 0 updates every frame.
    pub update_interval_seconds: f64,
    /// Quantile mode: rolling window length in seconds.
    pub quantile_window_seconds: f64,
    /// Quantile mode: required sample count before updating.
    pub quantile_min_samples: usize,
}

impl Default for AdaptiveThresholdConfig {
    fn default() -> Self {
        Self {
            mode: AdaptMode::Exponential,
            reward_direction: RewardDirection::Above,
            target_reward_rate: 0.6,
            eta: 0.10,
            update_interval_seconds: 0.0,
            quantile_window_seconds: 30.0,
            quantile_min_samples: 20,
        }
    }
}

/// Stateful adaptive threshold controller.
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    cfg: AdaptiveThresholdConfig,
    // (t_end_sec, metric); only used in Quantile mode.
    hist: VecDeque<(f64, f64)>,
    last_update_t: f64,
    update_count: usize,
    last_desired_threshold: f64,
}

impl AdaptiveThreshold {
    pub fn new(cfg: AdaptiveThresholdConfig) -> Self {
        Self {
            cfg,
            hist: VecDeque::new(),
            last_update_t: f64::NAN,
            update_count: 0,
            last_desired_threshold: f64::NAN,
        }
    }

    pub fn config(&self) -> &AdaptiveThresholdConfig {
        &self.cfg
    }

    pub fn mode(&self) -> AdaptMode {
        self.cfg.mode
    }

    pub fn reset(&mut self) {
        self.hist.clear();
        self.last_update_t = f64::NAN;
        self.update_count = 0;
        self.last_desired_threshold = f64::NAN;
    }

    pub fn history_len(&self) -> usize {
        self.hist.len()
    }

    pub fn update_count(&self) -> usize {
        self.update_count
    }

    /// The quantile target the last update used (NaN before any update).
    pub fn last_desired_threshold(&self) -> f64 {
        self.last_desired_threshold
    }

    /// Record an observed metric value (Quantile mode only; no-op
    /// otherwise).
    pub fn observe(&mut self, t_end_sec: f64, metric_value: f64) {
        if self.cfg.mode != AdaptMode::Quantile {
            return;
        }
        if !t_end_sec.is_finite() || !metric_value.is_finite() {
            return;
        }
        self.prune(t_end_sec);
        self.hist.push_back((t_end_sec, metric_value));
    }

    fn prune(&mut self, t_end_sec: f64) {
        if !(self.cfg.quantile_window_seconds > 0.0) || !t_end_sec.is_finite() {
            return;
        }
        while let Some(&(t0, _)) = self.hist.front() {
            if t_end_sec - t0 > self.cfg.quantile_window_seconds {
                self.hist.pop_front();
            } else {
                break;
            }
        }
    }

    /// Target quantile implied by (direction, target reward rate).
    pub fn target_quantile(&self) -> f64 {
        let r = self.cfg.target_reward_rate;
        let q = match self.cfg.reward_direction {
            RewardDirection::Above => 1.0 - r,
            RewardDirection::Below => r,
        };
        if q.is_finite() { q.clamp(0.0, 1.0) } else { 0.5 }
    }

    /// Produce the next threshold from the current one.
    pub fn update(&mut self, current_threshold: f64, reward_rate: f64, t_end_sec: f64) -> f64 {
        if !current_threshold.is_finite() {
            return current_threshold;
        }
        if !(self.cfg.eta > 0.0) || !self.cfg.eta.is_finite() {
            return current_threshold;
        }

        // Optional interval gate.
        if self.cfg.update_interval_seconds > 0.0
            && self.last_update_t.is_finite()
            && t_end_sec.is_finite()
        {
            let dt = t_end_sec - self.last_update_t;
            if dt >= 0.0 && dt < self.cfg.update_interval_seconds {
                return current_threshold;
            }
        }

        if self.cfg.mode == AdaptMode::Exponential {
            let next = adapt_threshold(
                current_threshold,
                reward_rate,
                self.cfg.target_reward_rate,
                self.cfg.eta,
                self.cfg.reward_direction,
            );
            if next != current_threshold {
                self.update_count += 1;
                if t_end_sec.is_finite() {
                    self.last_update_t = t_end_sec;
                }
            }
            return next;
        }

        // Quantile mode.
        self.prune(t_end_sec);
        if self.hist.len() < self.cfg.quantile_min_samples.max(1) {
            return current_threshold;
        }

        let mut values: Vec<f64> = self.hist.iter().map(|&(_, v)| v).collect();
        let desired = quantile_inplace(&mut values, self.target_quantile());
        self.last_desired_threshold = desired;
        if !desired.is_finite() {
            return current_threshold;
        }

        let alpha = self.cfg.eta.clamp(0.0, 1.0);
        let next = current_threshold + alpha * (desired - current_threshold);

        self.update_count += 1;
        if t_end_sec.is_finite() {
            self.last_update_t = t_end_sec;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quantile_cfg() -> AdaptiveThresholdConfig {
        AdaptiveThresholdConfig {
            mode: AdaptMode::Quantile,
            reward_direction: RewardDirection::Above,
            target_reward_rate: 0.5,
            eta: 1.0,
            update_interval_seconds: 0.0,
            quantile_window_seconds: 100.0,
            quantile_min_samples: 1,
        }
    }

    #[test]
    fn quantile_jumps_to_median_with_full_blend() {
        let mut ctl = AdaptiveThreshold::new(quantile_cfg());
        for i in 0..10 {
            ctl.observe(i as f64, i as f64);
        }
        let thr = ctl.update(0.0, 0.0, 9.0);
        assert_relative_eq!(thr, 4.5);
    }

    #[test]
    fn quantile_window_prunes_old_values() {
        let mut cfg = quantile_cfg();
        cfg.quantile_window_seconds = 5.0;
        let mut ctl = AdaptiveThreshold::new(cfg);
        for i in 0..10 {
            ctl.observe(i as f64, i as f64);
        }
        // Only times 4..9 survive a 5 s window ending at t=9.
        let thr = ctl.update(0.0, 0.0, 9.0);
        assert_relative_eq!(thr, 6.5);
    }

    #[test]
    fn interval_gate_skips_updates() {
        let mut cfg = quantile_cfg();
        cfg.update_interval_seconds = 10.0;
        let mut ctl = AdaptiveThreshold::new(cfg);
        for i in 0..10 {
            ctl.observe(i as f64, i as f64);
        }
        let thr1 = ctl.update(0.0, 0.0, 9.0);
        assert_relative_eq!(thr1, 4.5);

        // An extreme new value would change the quantile, but dt < 10 s.
        ctl.observe(10.0, 1000.0);
        let thr2 = ctl.update(thr1, 0.0, 12.0);
        assert_relative_eq!(thr2, thr1);

        let thr3 = ctl.update(thr2, 0.0, 20.0);
        assert!((thr3 - thr1).abs() > 1e-9);
    }

    #[test]
    fn below_direction_uses_target_quantile_directly() {
        let mut cfg = quantile_cfg();
        cfg.reward_direction = RewardDirection::Below;
        cfg.target_reward_rate = 0.2;
        let ctl = AdaptiveThreshold::new(cfg);
        assert_relative_eq!(ctl.target_quantile(), 0.2);
    }

    #[test]
    fn exponential_counts_updates() {
        let mut ctl = AdaptiveThreshold::new(AdaptiveThresholdConfig::default());
        let thr = ctl.update(10.0, 0.8, 1.0);
        assert!(thr > 10.0);
        assert_eq!(ctl.update_count(), 1);
    }

    #[test]
    fn partial_blend_moves_halfway() {
        let mut cfg = quantile_cfg();
        cfg.eta = 0.5;
        let mut ctl = AdaptiveThreshold::new(cfg);
        for i in 0..10 {
            ctl.observe(i as f64, i as f64);
        }
        let thr = ctl.update(0.0, 0.0, 9.0);
        assert_relative_eq!(thr, 2.25); // 0 + 0.5 * (4.5 - 0)
    }

    #[test]
    fn mode_parse() {
        assert_eq!(AdaptMode::parse("exp").unwrap(), AdaptMode::Exponential);
        assert_eq!(AdaptMode::parse("q").unwrap(), AdaptMode::Quantile);
        assert!(AdaptMode::parse("nope").is_err());
    }
}
