//! Robust statistics shared by the artifact detector and the NF controller

/// Scale factor that turns a MAD into a robust sigma estimate under
/// normality.
pub const MAD_SIGMA_SCALE: f64 = 1.4826;

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of a copied slice; NaN for an empty slice.
///
/// Even-length inputs average the two middle order statistics.
pub fn median(values: &[f64]) -> f64 {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    median_inplace(&mut v)
}

/// Median that sorts the given buffer in place (no allocation).
pub fn median_inplace(v: &mut [f64]) -> f64 {
    let n = v.len();
    if n == 0 {
        return f64::NAN;
    }
    let mid = n / 2;
    v.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let hi = v[mid];
    if n % 2 == 1 {
        hi
    } else {
        let (_, lo, _) = v[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        0.5 * (*lo + hi)
    }
}

/// Empirical quantile with linear interpolation between order statistics.
///
/// `q` is clamped to [0,1]; the buffer is sorted in place. NaN for empty
/// input.
pub fn quantile_inplace(v: &mut [f64], q: f64) -> f64 {
    let n = v.len();
    if n == 0 {
        return f64::NAN;
    }
    v.sort_unstable_by(|a, b| a.total_cmp(b));
    if n == 1 {
        return v[0];
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        v[lo]
    } else {
        let frac = pos - lo as f64;
        v[lo] + frac * (v[hi] - v[lo])
    }
}

/// Median absolute deviation around the median, scaled by
/// [`MAD_SIGMA_SCALE`]. NaN for empty input.
pub fn mad_sigma(values: &[f64]) -> f64 {
    let med = median(values);
    if !med.is_finite() {
        return f64::NAN;
    }
    let mut dev: Vec<f64> = values
        .iter()
        .filter(|x| x.is_finite())
        .map(|x| (x - med).abs())
        .collect();
    MAD_SIGMA_SCALE * median_inplace(&mut dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_odd_even() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn median_ignores_nonfinite() {
        assert_relative_eq!(median(&[1.0, f64::NAN, 3.0]), 2.0);
    }

    #[test]
    fn quantile_interpolates() {
        let mut v = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert_relative_eq!(quantile_inplace(&mut v, 0.5), 4.5);
        let mut v2 = vec![5.0, 6.0, 7.0, 8.0, 9.0];
        assert_relative_eq!(quantile_inplace(&mut v2, 0.5), 7.0);
        let mut v3 = vec![2.0];
        assert_relative_eq!(quantile_inplace(&mut v3, 0.9), 2.0);
    }

    #[test]
    fn mad_of_constant_is_zero() {
        assert_relative_eq!(mad_sigma(&[5.0, 5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn mad_matches_hand_computation() {
        // median = 3, |dev| = [2,1,0,1,2], MAD = 1
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(mad_sigma(&v), MAD_SIGMA_SCALE, epsilon = 1e-12);
    }
}
