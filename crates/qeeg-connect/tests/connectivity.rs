//! Connectivity scenario tests
//!
//! Synthetic oscillator pairs with known phase relationships, mirroring the
//! conditions these estimators are used in: shared rhythms, fixed lags, and
//! noise controls.

use std::f64::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use qeeg_connect::{
    CoherenceMeasure, PhaseMeasure, PhaseOptions, band_average, coherence_spectrum, pac,
    phase_connectivity_matrix, pli, plv, wpli, wpli2_debiased, PacMethod, PacOptions,
};
use qeeg_core::BandDefinition;
use qeeg_dsp::WelchOptions;

/// Standard normal deviate via Box-Muller over the seeded stream.
fn gauss(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn sine_with_noise(
    fs: f64,
    seconds: f64,
    freq: f64,
    phase: f64,
    noise_std: f64,
    rng: &mut ChaCha8Rng,
) -> Vec<f32> {
    let n = (seconds * fs).round() as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            ((2.0 * PI * freq * t + phase).sin() + noise_std * gauss(rng)) as f32
        })
        .collect()
}

fn alpha() -> BandDefinition {
    BandDefinition::new("alpha", 8.0, 12.0)
}

#[test]
fn plv_distinguishes_lag_but_not_locking() {
    let fs = 256.0;
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = sine_with_noise(fs, 10.0, 10.0, 0.0, 0.05, &mut rng);
    let y_same = sine_with_noise(fs, 10.0, 10.0, 0.0, 0.05, &mut rng);
    let y_shift = sine_with_noise(fs, 10.0, 10.0, PI / 2.0, 0.05, &mut rng);

    let opt = PhaseOptions {
        zero_phase: true,
        edge_trim_fraction: 0.10,
    };
    let band = alpha();

    let plv_same = plv(&x, &y_same, fs, &band, &opt).unwrap();
    let plv_shift = plv(&x, &y_shift, fs, &band, &opt).unwrap();
    // Same-frequency oscillators are phase locked regardless of the lag.
    assert!(plv_same > 0.85, "plv_same = {plv_same}");
    assert!(plv_shift > 0.85, "plv_shift = {plv_shift}");

    // PLI sees only the lag: near zero in phase, near one at quarter cycle.
    let pli_same = pli(&x, &y_same, fs, &band, &opt).unwrap();
    let pli_shift = pli(&x, &y_shift, fs, &band, &opt).unwrap();
    assert!(pli_same < 0.30, "pli_same = {pli_same}");
    assert!(pli_shift > 0.70, "pli_shift = {pli_shift}");
}

#[test]
fn plv_drops_for_drifting_phase() {
    let fs = 256.0;
    let mut rng = ChaCha8Rng::seed_from_u64(123);
    let x = sine_with_noise(fs, 10.0, 10.0, 0.0, 0.05, &mut rng);
    let y_diff = sine_with_noise(fs, 10.0, 12.0, 0.0, 0.05, &mut rng);

    let opt = PhaseOptions {
        zero_phase: true,
        edge_trim_fraction: 0.10,
    };
    let v = plv(&x, &y_diff, fs, &alpha(), &opt).unwrap();
    assert!(v < 0.65, "plv for drifting phase = {v}");
}

#[test]
fn wpli_family_tracks_lag() {
    let fs = 256.0;
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = sine_with_noise(fs, 10.0, 10.0, 0.0, 0.05, &mut rng);
    let y_same = sine_with_noise(fs, 10.0, 10.0, 0.0, 0.05, &mut rng);
    let y_shift = sine_with_noise(fs, 10.0, 10.0, PI / 2.0, 0.05, &mut rng);

    let opt = PhaseOptions {
        zero_phase: true,
        edge_trim_fraction: 0.10,
    };
    let band = alpha();

    let wpli_same = wpli(&x, &y_same, fs, &band, &opt).unwrap();
    let wpli_shift = wpli(&x, &y_shift, fs, &band, &opt).unwrap();
    assert!(wpli_same < 0.35, "wpli_same = {wpli_same}");
    assert!(wpli_shift > 0.70, "wpli_shift = {wpli_shift}");

    let w2_same = wpli2_debiased(&x, &y_same, fs, &band, &opt).unwrap();
    let w2_shift = wpli2_debiased(&x, &y_shift, fs, &band, &opt).unwrap();
    assert!(w2_same < 0.25, "wpli2_same = {w2_same}");
    assert!(w2_shift > 0.50, "wpli2_shift = {w2_shift}");
}

#[test]
fn phase_matrices_are_symmetric_with_unit_or_zero_diagonal() {
    let fs = 256.0;
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let channels = vec![
        sine_with_noise(fs, 8.0, 10.0, 0.0, 0.05, &mut rng),
        sine_with_noise(fs, 8.0, 10.0, 0.0, 0.05, &mut rng),
        sine_with_noise(fs, 8.0, 10.0, PI / 2.0, 0.05, &mut rng),
    ];
    let opt = PhaseOptions {
        zero_phase: true,
        edge_trim_fraction: 0.10,
    };

    for measure in [
        PhaseMeasure::Plv,
        PhaseMeasure::Pli,
        PhaseMeasure::WeightedPli,
        PhaseMeasure::WeightedPli2Debiased,
    ] {
        let m = phase_connectivity_matrix(measure, &channels, fs, &alpha(), &opt).unwrap();
        assert_eq!(m.len(), 3);
        for i in 0..3 {
            assert!(
                (m[i][i] - measure.self_coupling()).abs() < 1e-9,
                "{} diagonal",
                measure.name()
            );
            for j in 0..3 {
                let (a, b) = (m[i][j], m[j][i]);
                assert!(a.is_nan() == b.is_nan() && (a.is_nan() || (a - b).abs() < 1e-12));
                assert!(a.is_nan() || (0.0..=1.0).contains(&a));
            }
        }
    }
}

#[test]
fn coherence_separates_shared_signal_from_noise() {
    let fs = 256.0;
    let n = (20.0 * fs) as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(123);

    let mut x = Vec::with_capacity(n);
    let mut y_same = Vec::with_capacity(n);
    let mut y_noise = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 / fs;
        let s = (2.0 * PI * 10.0 * t).sin();
        x.push((s + 0.2 * gauss(&mut rng)) as f32);
        y_same.push((s + 0.2 * gauss(&mut rng)) as f32);
        y_noise.push(gauss(&mut rng) as f32);
    }

    let opt = WelchOptions {
        nperseg: 512,
        overlap_fraction: 0.5,
    };

    let spec_same =
        coherence_spectrum(&x, &y_same, fs, &opt, CoherenceMeasure::MagnitudeSquared).unwrap();
    let spec_noise =
        coherence_spectrum(&x, &y_noise, fs, &opt, CoherenceMeasure::MagnitudeSquared).unwrap();

    let msc_same = band_average(&spec_same, 8.0, 12.0);
    let msc_noise = band_average(&spec_noise, 8.0, 12.0);

    assert!((0.0..=1.0).contains(&msc_same));
    assert!((0.0..=1.0).contains(&msc_noise));
    assert!(
        msc_same > msc_noise + 0.10,
        "msc_same = {msc_same}, msc_noise = {msc_noise}"
    );
}

#[test]
fn imaginary_coherency_sees_only_lagged_coupling() {
    let fs = 256.0;
    let n = (12.0 * fs) as usize;
    let mut x = Vec::with_capacity(n);
    let mut y_inphase = Vec::with_capacity(n);
    let mut y_quarter = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 / fs;
        x.push((2.0 * PI * 10.0 * t).sin() as f32);
        y_inphase.push((2.0 * PI * 10.0 * t).sin() as f32);
        y_quarter.push((2.0 * PI * 10.0 * t + 0.5 * PI).sin() as f32);
    }

    let opt = WelchOptions {
        nperseg: 512,
        overlap_fraction: 0.5,
    };
    let spec0 = coherence_spectrum(
        &x,
        &y_inphase,
        fs,
        &opt,
        CoherenceMeasure::ImaginaryCoherencyAbs,
    )
    .unwrap();
    let spec90 = coherence_spectrum(
        &x,
        &y_quarter,
        fs,
        &opt,
        CoherenceMeasure::ImaginaryCoherencyAbs,
    )
    .unwrap();

    let im0 = band_average(&spec0, 8.0, 12.0);
    let im90 = band_average(&spec90, 8.0, 12.0);

    assert!(im0 < 0.2, "in-phase imcoh = {im0}");
    assert!(im90 > 0.5, "quarter-cycle imcoh = {im90}");
    assert!(im90 > im0 + 0.3);
}

#[test]
fn pac_mi_detects_theta_gamma_coupling() {
    let fs = 500.0;
    let n = (12.0 * fs) as usize;
    let x: Vec<f32> = (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            let low = (2.0 * PI * 6.0 * t).sin();
            let env = 1.0 + 0.9 * low;
            (0.5 * low + env * (2.0 * PI * 80.0 * t).sin()) as f32
        })
        .collect();

    let opt = PacOptions {
        method: PacMethod::ModulationIndex,
        n_phase_bins: 18,
        edge_trim_fraction: 0.10,
        zero_phase: true,
    };
    let est = pac(
        &x,
        fs,
        &BandDefinition::new("theta", 4.0, 8.0),
        &BandDefinition::new("gamma", 70.0, 90.0),
        &opt,
    )
    .unwrap();

    assert!(est.value.is_finite());
    assert!(est.value > 0.03, "MI = {}", est.value);
}
