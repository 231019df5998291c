//! End-to-end neurofeedback loop
//!
//! Streams a synthetic two-channel recording through the preprocessing
//! chain, the artifact detector, a band-power metric engine, and the
//! controller, the way a front-end drives a session.

use std::f64::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use qeeg_core::default_eeg_bands;
use qeeg_dsp::WelchOptions;
use qeeg_nf::{
    AdaptiveThresholdConfig, MetricEngine, MetricEngineOptions, MetricSpec, NfConfig,
    NfController, NfDecision, RewardDirection,
};
use qeeg_online::{
    ArtifactDetector, ArtifactOptions, PreprocessOptions, StreamingPreprocessor,
};

const FS: f64 = 128.0;

fn engine_options() -> MetricEngineOptions {
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

fn controller_config(artifact_gate: bool) -> NfConfig {
    NfConfig {
        fs_hz: FS,
        direction: RewardDirection::Above,
        baseline_seconds: 10.0,
        update_seconds: 0.25,
        rate_window_seconds: 5.0,
        hysteresis: 0.0,
        feedback_span: 1.0,
        artifact_gate,
        adapt: Some(AdaptiveThresholdConfig {
            eta: 0.05,
            ..Default::default()
        }),
    }
}

/// Two channels of 10 Hz alpha with noise; `amp_of_t` shapes the Pz
/// amplitude over time.
fn make_block(
    rng: &mut ChaCha8Rng,
    t0_samples: usize,
    n: usize,
    amp_of_t: impl Fn(f64) -> f64,
) -> Vec<Vec<f32>> {
    let mut pz = Vec::with_capacity(n);
    let mut cz = Vec::with_capacity(n);
    for i in 0..n {
        let t = (t0_samples + i) as f64 / FS;
        let alpha = (2.0 * PI * 10.0 * t).sin();
        pz.push((amp_of_t(t) * alpha + 0.1 * (rng.random::<f64>() - 0.5)) as f32);
        cz.push((0.5 * alpha + 0.1 * (rng.random::<f64>() - 0.5)) as f32);
    }
    vec![pz, cz]
}

fn run_session(
    amp_of_t: impl Fn(f64) -> f64 + Copy,
    seconds: f64,
    artifact_gate: bool,
) -> Vec<NfDecision> {
    let names = vec!["Pz".to_string(), "Cz".to_string()];
    let mut rng = ChaCha8Rng::seed_from_u64(31);

    let mut pre = StreamingPreprocessor::new(
        2,
        FS,
        PreprocessOptions {
            average_reference: false,
            highpass_hz: 1.0,
            ..Default::default()
        },
    )
    .unwrap();
    let mut detector = ArtifactDetector::new(
        names.clone(),
        FS,
        ArtifactOptions {
            window_seconds: 2.0,
            update_seconds: 0.25,
            baseline_seconds: 10.0,
            ..Default::default()
        },
    )
    .unwrap();
    let spec = MetricSpec::parse("alpha:Pz").unwrap();
    let mut engine =
        MetricEngine::new(&spec, &names, FS, &default_eeg_bands(), &engine_options()).unwrap();
    let mut controller = NfController::new(controller_config(artifact_gate)).unwrap();

    let chunk = (0.5 * FS) as usize;
    let total = (seconds * FS) as usize;
    let mut decisions = Vec::new();
    let mut pos = 0usize;
    while pos < total {
        let n = chunk.min(total - pos);
        let mut block = make_block(&mut rng, pos, n, amp_of_t);
        pre.process_block(&mut block).unwrap();
        for frame in detector.push_block(&block).unwrap() {
            controller.push_artifact_frame(frame);
        }
        for frame in engine.push_block(&block).unwrap() {
            decisions.push(controller.process(frame.t_end_sec, frame.value));
        }
        pos += n;
    }
    decisions
}

#[test]
fn rewards_start_after_baseline_when_alpha_rises() {
    // Amplitude steps up well after the baseline period.
    let amp = |t: f64| if t < 12.0 { 1.0 } else { 2.5 };
    let decisions = run_session(amp, 24.0, false);
    assert!(!decisions.is_empty());

    // Frames are strictly ordered in time.
    for pair in decisions.windows(2) {
        assert!(pair[1].t_end_sec > pair[0].t_end_sec);
    }

    // No rewards (and no threshold) while the baseline accumulates.
    for d in decisions.iter().filter(|d| d.t_end_sec <= 10.0) {
        assert!(!d.reward);
        assert!(d.threshold.is_none());
    }

    // After the amplitude step, power sits far above the baseline median
    // and rewards flow.
    let late: Vec<_> = decisions.iter().filter(|d| d.t_end_sec > 15.0).collect();
    assert!(!late.is_empty());
    let reward_frac =
        late.iter().filter(|d| d.reward).count() as f64 / late.len() as f64;
    assert!(reward_frac > 0.8, "late reward fraction {reward_frac}");
    assert!(late.iter().all(|d| d.threshold.is_some()));

    // Adaptation pushes the threshold above its initial value under
    // sustained reward.
    let first_thr = decisions
        .iter()
        .find_map(|d| d.threshold)
        .expect("threshold was set");
    let last_thr = decisions.last().unwrap().threshold.unwrap();
    assert!(last_thr > first_thr, "{last_thr} vs {first_thr}");
}

#[test]
fn artifact_burst_suppresses_reward() {
    // Steady alpha with a huge burst in the 14-16 s range. The amplitude
    // stays at its baseline level elsewhere so only the burst trips the
    // detector.
    let amp = |t: f64| if (14.0..16.0).contains(&t) { 60.0 } else { 1.0 };
    let decisions = run_session(amp, 24.0, true);

    // Without gating the burst would be a sure reward; with gating the
    // flagged frames emit none.
    let gated: Vec<_> = decisions
        .iter()
        .filter(|d| {
            d.artifact
                .map(|a| a.baseline_ready && a.bad)
                .unwrap_or(false)
        })
        .collect();
    assert!(!gated.is_empty(), "expected at least one gated frame");
    assert!(gated.iter().all(|d| !d.reward && d.feedback_value == 0.0));

    // Clean frames after the burst still earn rewards.
    let clean_late: Vec<_> = decisions
        .iter()
        .filter(|d| d.t_end_sec > 19.0 && d.artifact.map(|a| !a.bad).unwrap_or(true))
        .collect();
    assert!(clean_late.iter().any(|d| d.reward));
}
