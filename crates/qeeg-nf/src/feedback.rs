//! Continuous feedback value derived from metric and threshold

use crate::direction::RewardDirection;

/// Map a metric/threshold pair onto a feedback intensity in [0, 1].
///
/// `span` is the metric delta that maps to full-scale feedback; a
/// non-positive or non-finite span is treated as 1. Non-finite metric or
/// threshold yields 0.
pub fn feedback_value(
    metric: f64,
    threshold: f64,
    direction: RewardDirection,
    span: f64,
) -> f64 {
    if !metric.is_finite() || !threshold.is_finite() {
        return 0.0;
    }
    let span = if span.is_finite() && span > 0.0 { span } else { 1.0 };
    let delta = match direction {
        RewardDirection::Above => metric - threshold,
        RewardDirection::Below => threshold - metric,
    };
    let v = delta / span;
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}
