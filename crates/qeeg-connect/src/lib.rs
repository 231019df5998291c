//! qeeg-connect: connectivity and coupling kernels
//!
//! Offline estimators working on whole windows or recordings:
//! - `coherence` - Welch cross-spectra, magnitude-squared coherence and
//!   absolute imaginary coherency, band averages, pairwise matrices
//! - `phase` - PLV / PLI / wPLI / debiased wPLI^2 from narrow-band analytic
//!   signals
//! - `pac` - phase-amplitude coupling (Tort modulation index, mean vector
//!   length)

pub mod coherence;
pub mod pac;
pub mod phase;

pub use coherence::{
    CoherenceMeasure, CoherenceSpectrum, band_average, band_average_band, coherence_band_matrix,
    coherence_spectrum, msc_spectrum,
};
pub use pac::{PacEstimate, PacMethod, PacOptions, pac};
pub use phase::{
    PhaseMeasure, PhaseOptions, measure_from_analytic, phase_connectivity,
    phase_connectivity_matrix, pli, plv, wpli, wpli2_debiased,
};
