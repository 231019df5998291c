//! Polarity-invariant k-means over unit-norm topographies

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use qeeg_core::{QeegError, QeegResult};

/// Demean (optionally) and L2-normalize in place; false when the vector
/// has no usable norm.
pub(crate) fn demean_and_normalize(v: &mut [f64], demean: bool) -> bool {
    if v.is_empty() {
        return false;
    }
    if demean {
        let m = v.iter().sum::<f64>() / v.len() as f64;
        for x in v.iter_mut() {
            *x -= m;
        }
    }
    let n2: f64 = v.iter().map(|x| x * x).sum();
    if !(n2 > 0.0) {
        return false;
    }
    let n = n2.sqrt();
    if !n.is_finite() || n < 1e-12 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= n;
    }
    true
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Squared distance between unit vectors: `||x - c||^2 = 2 - 2*dot(x, c)`,
/// with `|dot|` under polarity invariance.
#[inline]
fn dist2_unit(x: &[f64], c: &[f64], polarity_invariant: bool) -> f64 {
    let mut d = dot(x, c);
    if polarity_invariant {
        d = d.abs();
    }
    2.0 - 2.0 * d
}

/// k-means++ seeding followed by Lloyd iteration with sign-absorbing
/// updates. Input rows must already be unit-norm.
pub(crate) fn kmeans_templates(
    points: &[Vec<f64>],
    k: usize,
    polarity_invariant: bool,
    demean_templates: bool,
    max_iterations: usize,
    tol: f64,
    seed: u64,
) -> QeegResult<Vec<Vec<f64>>> {
    if k == 0 {
        return Err(QeegError::invalid_param("k must be > 0"));
    }
    if points.is_empty() {
        return Err(QeegError::insufficient_data("no samples to cluster"));
    }
    let n = points.len();
    let dim = points[0].len();
    if points.iter().any(|row| row.len() != dim) {
        return Err(QeegError::invalid_param("inconsistent point dimensions"));
    }
    let k = k.min(n);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    // --- k-means++ initialization (polarity-aware distance) ---
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..n)].clone());

    let mut dist2 = vec![0.0f64; n];
    for _ in 1..k {
        let mut sum = 0.0;
        for (i, p) in points.iter().enumerate() {
            let best = centroids
                .iter()
                .map(|c| dist2_unit(p, c, polarity_invariant))
                .fold(f64::INFINITY, f64::min);
            dist2[i] = best;
            sum += best;
        }

        if !(sum > 0.0) || !sum.is_finite() {
            centroids.push(points[rng.random_range(0..n)].clone());
            continue;
        }

        let r: f64 = rng.random_range(0.0..sum);
        let mut acc = 0.0;
        let mut pick = 0usize;
        for (i, &d) in dist2.iter().enumerate() {
            acc += d;
            if acc >= r {
                pick = i;
                break;
            }
        }
        centroids.push(points[pick].clone());
    }

    // Centroids should already be normalized, but keep it safe.
    for c in &mut centroids {
        demean_and_normalize(c, demean_templates);
    }

    let mut labels = vec![usize::MAX; n];
    let mut signs = vec![1i32; n];

    for _ in 0..max_iterations {
        let mut any_change = false;

        // Assignment step.
        for (i, p) in points.iter().enumerate() {
            let mut best_d2 = f64::INFINITY;
            let mut best_k = 0usize;
            let mut best_s = 1i32;
            for (j, c) in centroids.iter().enumerate() {
                let mut d = dot(p, c);
                let mut s = 1i32;
                if polarity_invariant && d < 0.0 {
                    s = -1;
                    d = -d;
                }
                let d2 = 2.0 - 2.0 * d;
                if d2 < best_d2 {
                    best_d2 = d2;
                    best_k = j;
                    best_s = s;
                }
            }
            if labels[i] != best_k || signs[i] != best_s {
                labels[i] = best_k;
                signs[i] = best_s;
                any_change = true;
            }
        }

        // Update step: sign-weighted mean of members.
        let mut new_centroids = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, p) in points.iter().enumerate() {
            let lab = labels[i];
            let acc = &mut new_centroids[lab];
            if polarity_invariant && signs[i] < 0 {
                for (a, x) in acc.iter_mut().zip(p) {
                    *a -= x;
                }
            } else {
                for (a, x) in acc.iter_mut().zip(p) {
                    *a += x;
                }
            }
            counts[lab] += 1;
        }
        for (j, c) in new_centroids.iter_mut().enumerate() {
            if counts[j] == 0 {
                // Empty cluster: reseed from a random point.
                *c = points[rng.random_range(0..n)].clone();
            } else {
                let inv = 1.0 / counts[j] as f64;
                for x in c.iter_mut() {
                    *x *= inv;
                }
            }
            demean_and_normalize(c, demean_templates);
        }

        // Convergence: max centroid shift after polarity alignment.
        let mut max_shift = 0.0f64;
        for (old_c, new_c) in centroids.iter().zip(&new_centroids) {
            let mut flipped;
            let aligned: &[f64] = if polarity_invariant && dot(old_c, new_c) < 0.0 {
                flipped = new_c.clone();
                for x in flipped.iter_mut() {
                    *x = -*x;
                }
                &flipped
            } else {
                new_c
            };
            let s2: f64 = old_c
                .iter()
                .zip(aligned)
                .map(|(a, b)| (b - a) * (b - a))
                .sum();
            max_shift = max_shift.max(s2.sqrt());
        }

        centroids = new_centroids;

        if !any_change || max_shift < tol {
            break;
        }
    }

    Ok(centroids)
}
