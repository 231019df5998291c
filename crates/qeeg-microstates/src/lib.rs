//! qeeg-microstates: a first-pass EEG microstate analysis engine
//!
//! Microstates are quasi-stable scalp topographies estimated by clustering
//! channel topographies at peaks of Global Field Power (GFP). The recipe:
//!  1. compute GFP over time
//!  2. pick the strongest local maxima (GFP peaks)
//!  3. build normalized topographies at those peaks
//!  4. k-means cluster them with optional polarity invariance
//!  5. assign every sample to the closest template and compute statistics
//!
//! For best results, apply common-average reference and a light bandpass
//! beforehand.

mod kmeans;
mod segments;

pub use segments::{MicrostateSegment, microstate_segments};

use kmeans::{demean_and_normalize, dot, kmeans_templates};
use qeeg_core::{QeegError, QeegResult, Recording};

/// Options for [`estimate_microstates`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MicrostatesOptions {
    /// Number of microstates to estimate.
    pub k: usize,
    /// Fraction of GFP peaks kept for clustering, strongest first.
    /// Typical values are around 0.05-0.15.
    pub peak_pick_fraction: f64,
    /// Cap on the number of peaks used for clustering (runtime control).
    pub max_peaks: usize,
    /// Minimum spacing between selected peaks in samples; 0 disables.
    pub min_peak_distance_samples: usize,
    /// Subtract the channel-wise mean from each topography before
    /// normalizing. Redundant after CAR but kept as a safeguard.
    pub demean_topography: bool,
    /// Treat topographies as equivalent up to sign.
    pub polarity_invariant: bool,
    pub max_iterations: usize,
    pub convergence_tol: f64,
    /// Seed for the k-means++ PRNG; estimation is deterministic given the
    /// seed.
    pub seed: u64,
    /// Merge label runs shorter than this into a neighbor; 0 disables.
    pub min_segment_samples: usize,
}

impl Default for MicrostatesOptions {
    fn default() -> Self {
        Self {
            k: 4,
            peak_pick_fraction: 0.10,
            max_peaks: 1000,
            min_peak_distance_samples: 0,
            demean_topography: true,
            polarity_invariant: true,
            max_iterations: 100,
            convergence_tol: 1e-6,
            seed: 12345,
            min_segment_samples: 0,
        }
    }
}

/// Result of a microstate estimation.
#[derive(Debug, Clone)]
pub struct MicrostatesResult {
    /// `k x n_channels`; each template is unit-norm (L2), optionally
    /// demeaned.
    pub templates: Vec<Vec<f64>>,
    /// Per-sample labels in `[0, k)`; -1 marks an undefined sample
    /// (zero-norm topography).
    pub labels: Vec<i32>,
    /// Global Field Power time series.
    pub gfp: Vec<f64>,
    /// Per-sample absolute correlation (cosine similarity) to the
    /// assigned template, in [0, 1].
    pub corr: Vec<f64>,
    /// Global explained variance:
    /// `sum_t GFP(t)^2 * corr(t)^2 / sum_t GFP(t)^2`.
    pub gev: f64,
    /// Per-state contributions to the GEV (sums to `gev`).
    pub gev_state: Vec<f64>,
    /// Fraction of samples assigned to each state.
    pub coverage: Vec<f64>,
    pub mean_duration_sec: Vec<f64>,
    pub occurrence_per_sec: Vec<f64>,
    /// Transition counts between consecutive distinct-labeled segments.
    pub transition_counts: Vec<Vec<u32>>,
}

/// Global Field Power: per-sample cross-channel standard deviation.
pub fn compute_gfp(rec: &Recording) -> Vec<f64> {
    let n_ch = rec.n_channels();
    let n = rec.n_samples();
    let mut gfp = vec![0.0; n];
    if n_ch == 0 || n == 0 {
        return gfp;
    }
    for (t, g) in gfp.iter_mut().enumerate() {
        let mut mean = 0.0;
        for ch in &rec.data {
            mean += ch[t] as f64;
        }
        mean /= n_ch as f64;

        let mut var = 0.0;
        for ch in &rec.data {
            let d = ch[t] as f64 - mean;
            var += d * d;
        }
        var /= n_ch as f64;
        *g = var.max(0.0).sqrt();
    }
    gfp
}

/// Strict-left, weak-right local maxima of the GFP.
fn find_gfp_peaks_raw(gfp: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if gfp.len() < 3 {
        return peaks;
    }
    for i in 1..gfp.len() - 1 {
        if gfp[i] > gfp[i - 1] && gfp[i] >= gfp[i + 1] {
            peaks.push(i);
        }
    }
    peaks
}

/// Greedy peak thinning by descending GFP.
fn enforce_min_distance(peaks: &[usize], gfp: &[f64], min_dist: usize) -> Vec<usize> {
    if min_dist == 0 || peaks.is_empty() {
        return peaks.to_vec();
    }
    let mut order = peaks.to_vec();
    order.sort_by(|&a, &b| gfp[b].total_cmp(&gfp[a]));

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for idx in order {
        if kept.iter().all(|&j| idx.abs_diff(j) >= min_dist) {
            kept.push(idx);
        }
    }
    kept.sort_unstable();
    kept
}

fn pick_top_fraction(
    peaks: &[usize],
    gfp: &[f64],
    frac: f64,
    max_peaks: usize,
    min_keep: usize,
) -> Vec<usize> {
    if peaks.is_empty() {
        return Vec::new();
    }
    let frac = if frac <= 0.0 || frac > 1.0 { 1.0 } else { frac };
    let mut want = (frac * peaks.len() as f64).ceil() as usize;
    want = want.max(min_keep).min(peaks.len());
    if max_peaks > 0 {
        want = want.min(max_peaks);
    }

    let mut order = peaks.to_vec();
    order.sort_by(|&a, &b| gfp[b].total_cmp(&gfp[a]));
    order.truncate(want);
    order.sort_unstable();
    order
}

fn topography_at(rec: &Recording, t: usize, out: &mut Vec<f64>) {
    out.clear();
    out.extend(rec.data.iter().map(|ch| ch[t] as f64));
}

fn extract_peak_topographies(
    rec: &Recording,
    peak_idx: &[usize],
    demean: bool,
) -> Vec<Vec<f64>> {
    let mut topos = Vec::with_capacity(peak_idx.len());
    let mut v = Vec::new();
    for &t in peak_idx {
        if t >= rec.n_samples() {
            continue;
        }
        topography_at(rec, t, &mut v);
        let mut topo = v.clone();
        if demean_and_normalize(&mut topo, demean) {
            topos.push(topo);
        }
    }
    topos
}

/// Bounded iterative merge of label runs shorter than `min_len` into the
/// neighbor with the longer run (ties prefer the previous run).
fn smooth_min_duration(labels: &mut [i32], min_len: usize) {
    let n = labels.len();
    if n == 0 || min_len <= 1 {
        return;
    }

    let mut changed = true;
    let mut guard = 0;
    while changed && guard < 10 {
        guard += 1;
        changed = false;
        let mut i = 0;
        while i < n {
            let lab = labels[i];
            let mut j = i + 1;
            while j < n && labels[j] == lab {
                j += 1;
            }
            let len = j - i;

            if lab >= 0 && len < min_len {
                let new_lab = if i == 0 {
                    if j < n { labels[j] } else { lab }
                } else if j >= n {
                    labels[i - 1]
                } else {
                    let prev_lab = labels[i - 1];
                    let next_lab = labels[j];
                    let prev_len = (0..i).rev().take_while(|&p| labels[p] == prev_lab).count();
                    let next_len = (j..n).take_while(|&q| labels[q] == next_lab).count();
                    if next_len > prev_len { next_lab } else { prev_lab }
                };

                if new_lab != lab && new_lab >= 0 {
                    for l in labels[i..j].iter_mut() {
                        *l = new_lab;
                    }
                    changed = true;
                }
            }
            i = j;
        }
    }
}

/// Estimate microstates on a full recording.
///
/// Templates come back in cluster order; naming them A, B, C... is a
/// presentation concern.
pub fn estimate_microstates(
    rec: &Recording,
    opt: &MicrostatesOptions,
) -> QeegResult<MicrostatesResult> {
    if rec.n_channels() < 2 {
        return Err(QeegError::invalid_param("need >= 2 channels"));
    }
    if rec.n_samples() < 3 {
        return Err(QeegError::invalid_param("need >= 3 samples"));
    }
    if opt.k == 0 {
        return Err(QeegError::invalid_param("k must be > 0"));
    }
    if !(rec.fs_hz > 0.0) {
        return Err(QeegError::invalid_param("fs_hz must be > 0"));
    }

    let gfp = compute_gfp(rec);

    // --- GFP peak selection ---
    let mut peaks = find_gfp_peaks_raw(&gfp);
    peaks = enforce_min_distance(&peaks, &gfp, opt.min_peak_distance_samples);

    // Flat GFP: fall back to a uniform subsample.
    if peaks.is_empty() {
        let stride = (rec.n_samples() / opt.max_peaks.max(1)).max(1);
        peaks = (0..rec.n_samples()).step_by(stride).collect();
    }

    peaks = pick_top_fraction(&peaks, &gfp, opt.peak_pick_fraction, opt.max_peaks, opt.k.max(1));

    let topos = extract_peak_topographies(rec, &peaks, opt.demean_topography);
    if topos.is_empty() {
        return Err(QeegError::numerical(
            "no usable peak topographies (all zero-norm?)",
        ));
    }
    log::debug!(
        "clustering {} peak topographies into k={} states",
        topos.len(),
        opt.k
    );

    let k = opt.k.min(topos.len());
    let templates = kmeans_templates(
        &topos,
        k,
        opt.polarity_invariant,
        opt.demean_topography,
        opt.max_iterations,
        opt.convergence_tol,
        opt.seed,
    )?;

    // --- Assign every sample ---
    let n = rec.n_samples();
    let mut labels = vec![-1i32; n];
    let mut corr = vec![0.0f64; n];
    let mut topo = Vec::new();
    for t in 0..n {
        topography_at(rec, t, &mut topo);
        if !demean_and_normalize(&mut topo, opt.demean_topography) {
            continue;
        }
        let mut best_absdot = -1.0;
        let mut best_k = 0usize;
        for (j, tpl) in templates.iter().enumerate() {
            let mut d = dot(&topo, tpl);
            if opt.polarity_invariant {
                d = d.abs();
            }
            if d > best_absdot {
                best_absdot = d;
                best_k = j;
            }
        }
        labels[t] = best_k as i32;
        corr[t] = best_absdot.clamp(0.0, 1.0);
    }

    if opt.min_segment_samples > 1 {
        smooth_min_duration(&mut labels, opt.min_segment_samples);
    }

    // --- Stats ---
    let mut coverage = vec![0.0f64; k];
    let mut sample_counts = vec![0usize; k];
    for &lab in &labels {
        if lab >= 0 && (lab as usize) < k {
            sample_counts[lab as usize] += 1;
        }
    }
    for (cov, &cnt) in coverage.iter_mut().zip(&sample_counts) {
        *cov = cnt as f64 / (n as f64).max(1.0);
    }

    let mut seg_count = vec![0usize; k];
    let mut seg_len_sum = vec![0.0f64; k];
    let mut transition_counts = vec![vec![0u32; k]; k];
    let mut prev_seg_lab: i32 = -1;
    let mut i = 0usize;
    while i < n {
        let lab = labels[i];
        let mut j = i + 1;
        while j < n && labels[j] == lab {
            j += 1;
        }
        if lab >= 0 && (lab as usize) < k {
            let li = lab as usize;
            seg_count[li] += 1;
            seg_len_sum[li] += (j - i) as f64;
            if prev_seg_lab >= 0 && (prev_seg_lab as usize) < k {
                transition_counts[prev_seg_lab as usize][li] += 1;
            }
            prev_seg_lab = lab;
        }
        i = j;
    }

    let duration_sec = n as f64 / rec.fs_hz;
    let mut mean_duration_sec = vec![0.0f64; k];
    let mut occurrence_per_sec = vec![0.0f64; k];
    for j in 0..k {
        if seg_count[j] > 0 {
            mean_duration_sec[j] = seg_len_sum[j] / seg_count[j] as f64 / rec.fs_hz;
            occurrence_per_sec[j] = seg_count[j] as f64 / duration_sec.max(1e-9);
        }
    }

    // Global explained variance and per-state contributions.
    let mut num_state = vec![0.0f64; k];
    let mut num = 0.0;
    let mut den = 0.0;
    for t in 0..n {
        let w = gfp[t] * gfp[t];
        den += w;
        let contrib = w * corr[t] * corr[t];
        num += contrib;
        let lab = labels[t];
        if lab >= 0 && (lab as usize) < k {
            num_state[lab as usize] += contrib;
        }
    }
    let gev = if den > 0.0 { num / den } else { 0.0 };
    let gev_state = if den > 0.0 {
        num_state.iter().map(|v| v / den).collect()
    } else {
        vec![0.0; k]
    };

    Ok(MicrostatesResult {
        templates,
        labels,
        gfp,
        corr,
        gev,
        gev_state,
        coverage,
        mean_duration_sec,
        occurrence_per_sec,
        transition_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gfp_of_known_topography() {
        // Two channels +1/-1: mean 0, variance 1, GFP 1.
        let rec = Recording::new(
            10.0,
            vec!["a".into(), "b".into()],
            vec![vec![1.0; 5], vec![-1.0; 5]],
        )
        .unwrap();
        let gfp = compute_gfp(&rec);
        for g in gfp {
            assert_relative_eq!(g, 1.0);
        }
    }

    #[test]
    fn peak_finding_prefers_strict_left_rise() {
        let gfp = vec![0.0, 1.0, 0.5, 2.0, 2.0, 0.1, 3.0, 0.0];
        let peaks = find_gfp_peaks_raw(&gfp);
        // Index 3 qualifies (strict left, weak right tie); index 4 does
        // not (flat left).
        assert_eq!(peaks, vec![1, 3, 6]);
    }

    #[test]
    fn min_distance_keeps_strongest() {
        let gfp = vec![0.0, 5.0, 0.0, 4.0, 0.0, 3.0, 0.0];
        let peaks = vec![1, 3, 5];
        let thinned = enforce_min_distance(&peaks, &gfp, 3);
        assert_eq!(thinned, vec![1, 5]);
    }

    #[test]
    fn smoothing_merges_short_runs() {
        let mut labels = vec![0, 0, 0, 0, 1, 0, 0, 0, 0];
        smooth_min_duration(&mut labels, 3);
        assert_eq!(labels, vec![0; 9]);

        // Tie between neighbors goes to the previous label.
        let mut labels = vec![1, 1, 2, 3, 3];
        smooth_min_duration(&mut labels, 2);
        assert_eq!(labels, vec![1, 1, 1, 3, 3]);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let rec = Recording::new(10.0, vec!["a".into()], vec![vec![0.0; 10]]).unwrap();
        assert!(estimate_microstates(&rec, &MicrostatesOptions::default()).is_err());

        let rec = Recording::new(
            10.0,
            vec!["a".into(), "b".into()],
            vec![vec![0.0; 2], vec![0.0; 2]],
        )
        .unwrap();
        assert!(estimate_microstates(&rec, &MicrostatesOptions::default()).is_err());

        let rec = Recording::new(
            10.0,
            vec!["a".into(), "b".into()],
            vec![vec![0.0; 10], vec![0.0; 10]],
        )
        .unwrap();
        let opt = MicrostatesOptions {
            k: 0,
            ..Default::default()
        };
        assert!(estimate_microstates(&rec, &opt).is_err());
    }

    #[test]
    fn all_zero_recording_has_no_usable_topographies() {
        let rec = Recording::new(
            10.0,
            vec!["a".into(), "b".into()],
            vec![vec![0.0; 100], vec![0.0; 100]],
        )
        .unwrap();
        let err = estimate_microstates(&rec, &MicrostatesOptions::default()).unwrap_err();
        assert!(matches!(err, QeegError::Numerical(_)));
    }
}
