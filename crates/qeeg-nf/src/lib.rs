//! qeeg-nf: the neurofeedback control loop
//!
//! From a metric spec string to reward decisions:
//! - `metric` - the compact metric grammar and stream smoothing
//! - `engine` - drives the matching online estimator, reduces frames to a
//!   scalar metric stream
//! - `gate` - Schmitt-trigger reward decision
//! - `adapt` - exponential / rolling-quantile threshold adaptation
//! - `controller` - baseline, artifact gating, reward history, feedback
//! - `protocols` - built-in protocol presets

pub mod adapt;
pub mod controller;
pub mod direction;
pub mod engine;
pub mod feedback;
pub mod gate;
pub mod metric;
pub mod protocols;

pub use adapt::{AdaptMode, AdaptiveThreshold, AdaptiveThresholdConfig};
pub use controller::{NfConfig, NfController, NfDecision};
pub use direction::{MIN_ABS_THRESHOLD, RewardDirection, adapt_threshold, is_reward};
pub use engine::{METRIC_EPS, MetricEngine, MetricEngineOptions, MetricFrame};
pub use feedback::feedback_value;
pub use gate::HysteresisGate;
pub use metric::{MetricSmoother, MetricSpec};
pub use protocols::{NfProtocolPreset, built_in_nf_protocols, find_nf_protocol_preset};
