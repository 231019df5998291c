//! Reward direction and the exponential threshold update

use qeeg_core::{QeegError, QeegResult};

/// Which side of the threshold earns reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RewardDirection {
    /// Reward when value > threshold.
    Above,
    /// Reward when value < threshold.
    Below,
}

impl RewardDirection {
    pub fn name(self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }

    pub fn parse(s: &str) -> QeegResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "above" | "gt" | ">" | "higher" | "high" | "up" => Ok(Self::Above),
            "below" | "lt" | "<" | "lower" | "low" | "down" => Ok(Self::Below),
            other => Err(QeegError::invalid_param(format!(
                "invalid reward direction: '{other}' (expected 'above' or 'below')"
            ))),
        }
    }
}

/// Strict threshold comparison in the configured direction.
#[inline]
pub fn is_reward(value: f64, threshold: f64, dir: RewardDirection) -> bool {
    match dir {
        RewardDirection::Above => value > threshold,
        RewardDirection::Below => value < threshold,
    }
}

/// A threshold of exactly zero would stay zero forever under a
/// multiplicative update; it is nudged to this magnitude first.
pub const MIN_ABS_THRESHOLD: f64 = 1e-12;

/// Exponential threshold update keeping the reward rate near target:
/// `thr *= exp(eta * (reward_rate - target_rate))`.
///
/// For `Below` the sign is inverted so the controller stays intuitive
/// (too many rewards moves the threshold the hard way in either
/// direction). Non-finite inputs or `eta <= 0` leave the threshold
/// unchanged.
pub fn adapt_threshold(
    threshold: f64,
    reward_rate: f64,
    target_rate: f64,
    eta: f64,
    dir: RewardDirection,
) -> f64 {
    if !threshold.is_finite()
        || !reward_rate.is_finite()
        || !target_rate.is_finite()
        || !eta.is_finite()
        || eta <= 0.0
    {
        return threshold;
    }

    let mut exponent = eta * (reward_rate - target_rate);
    if dir == RewardDirection::Below {
        exponent = -exponent;
    }

    let mut thr = threshold;
    if thr.abs() < MIN_ABS_THRESHOLD {
        thr = if thr >= 0.0 { MIN_ABS_THRESHOLD } else { -MIN_ABS_THRESHOLD };
    }
    thr * exponent.exp()
}
