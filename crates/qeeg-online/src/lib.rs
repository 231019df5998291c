//! qeeg-online: the streaming layer of the QEEG engine
//!
//! Windowed estimators built on per-channel ring buffers. Samples enter
//! through `push_block`; a frame is emitted whenever the update interval
//! elapses and the analysis window is full, with `t_end_sec` equal to the
//! time of the most recently pushed sample. Frames from a single call are
//! returned in temporal order.
//!
//! Each estimator instance exclusively owns its ring buffers and
//! accumulators; independent instances may run on different threads.
//!
//! ## Modules
//! - `ring` - fixed-capacity ring buffer
//! - `bandpower` / `coherence` / `phase` / `pac` - online estimators
//! - `preprocess` - causal CAR/notch/bandpass chain (+ offline zero-phase)
//! - `artifact` - windowed artifact detection with a robust baseline

pub mod artifact;
pub mod bandpower;
pub mod coherence;
mod framing;
pub mod pac;
pub mod phase;
pub mod preprocess;
pub mod ring;

pub use artifact::{ArtifactDetector, ArtifactFrame, ArtifactOptions};
pub use bandpower::{BandpowerFrame, OnlineBandpower, OnlineBandpowerOptions};
pub use coherence::{CoherenceFrame, OnlineCoherence, OnlineCoherenceOptions};
pub use framing::MIN_WINDOW_SAMPLES;
pub use pac::{OnlinePac, OnlinePacOptions, PacFrame};
pub use phase::{OnlinePhaseConnectivity, OnlinePhaseOptions, PhaseFrame};
pub use preprocess::{PreprocessOptions, StreamingPreprocessor, preprocess_recording};
pub use ring::RingBuffer;
