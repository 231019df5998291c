//! Frequency band definitions and the band spec grammar

use crate::error::{QeegError, QeegResult};

/// A named frequency interval `[fmin_hz, fmax_hz)` used for integration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandDefinition {
    pub name: String,
    pub fmin_hz: f64,
    pub fmax_hz: f64,
}

impl BandDefinition {
    pub fn new(name: impl Into<String>, fmin_hz: f64, fmax_hz: f64) -> Self {
        Self {
            name: name.into(),
            fmin_hz,
            fmax_hz,
        }
    }

    #[inline]
    pub fn width_hz(&self) -> f64 {
        self.fmax_hz - self.fmin_hz
    }

    /// Check `0 < fmin < fmax < fs/2` for measures that filter into the band.
    pub fn validate_for_fs(&self, fs_hz: f64) -> QeegResult<()> {
        if !(fs_hz > 0.0) {
            return Err(QeegError::invalid_param("fs_hz must be > 0"));
        }
        if !(self.fmin_hz > 0.0) || !(self.fmax_hz > self.fmin_hz) {
            return Err(QeegError::invalid_param(format!(
                "band '{}' requires 0 < fmin < fmax",
                self.name
            )));
        }
        if self.fmax_hz >= 0.5 * fs_hz {
            return Err(QeegError::invalid_param(format!(
                "band '{}' fmax must be < Nyquist ({} Hz)",
                self.name,
                0.5 * fs_hz
            )));
        }
        Ok(())
    }
}

/// Common default EEG bands (delta/theta/alpha/beta/gamma).
///
/// Band edges vary by protocol; presets that follow other conventions
/// override these via an explicit band spec.
pub fn default_eeg_bands() -> Vec<BandDefinition> {
    vec![
        BandDefinition::new("delta", 0.5, 4.0),
        BandDefinition::new("theta", 4.0, 7.0),
        BandDefinition::new("alpha", 8.0, 12.0),
        BandDefinition::new("beta", 13.0, 30.0),
        BandDefinition::new("gamma", 30.0, 80.0),
    ]
}

fn parse_one_band(token: &str) -> QeegResult<BandDefinition> {
    // token: name:fmin-fmax
    let (name, edges) = token.split_once(':').ok_or_else(|| {
        QeegError::invalid_param(format!(
            "invalid band token (expected name:fmin-fmax): {token}"
        ))
    })?;
    let (lo, hi) = edges.split_once('-').ok_or_else(|| {
        QeegError::invalid_param(format!(
            "invalid band edges (expected fmin-fmax): {token}"
        ))
    })?;
    let fmin = parse_f64(lo)?;
    let fmax = parse_f64(hi)?;
    if !(fmin >= 0.0 && fmax > fmin) {
        return Err(QeegError::invalid_param(format!(
            "invalid band range in: {token}"
        )));
    }
    Ok(BandDefinition::new(name.trim(), fmin, fmax))
}

/// Parse a band spec string like
/// `"delta:0.5-4,theta:4-7,alpha:8-12,beta:13-30,gamma:30-80"`.
///
/// Empty input (or an input of only separators) yields the default bands.
pub fn parse_band_spec(spec: &str) -> QeegResult<Vec<BandDefinition>> {
    let s = spec.trim();
    if s.is_empty() {
        return Ok(default_eeg_bands());
    }
    let mut out = Vec::new();
    for tok in s.split(',') {
        let t = tok.trim();
        if t.is_empty() {
            continue;
        }
        out.push(parse_one_band(t)?);
    }
    if out.is_empty() {
        return Ok(default_eeg_bands());
    }
    Ok(out)
}

/// Case-insensitive band lookup by name.
pub fn find_band_index(bands: &[BandDefinition], name: &str) -> Option<usize> {
    let target = name.trim().to_lowercase();
    bands.iter().position(|b| b.name.to_lowercase() == target)
}

/// Resolve a band token against the active band list.
///
/// Accepts a band name (case-insensitive) or an explicit range `"LO-HI"`
/// with `0 < LO < HI`, which becomes an ad-hoc band named after `label`.
pub fn resolve_band_token(
    bands: &[BandDefinition],
    token: &str,
    label: &str,
) -> QeegResult<BandDefinition> {
    if let Some(idx) = find_band_index(bands, token) {
        return Ok(bands[idx].clone());
    }

    let t = token.trim();
    if let Some((lo_s, hi_s)) = t.split_once('-') {
        let lo = parse_f64(lo_s)?;
        let hi = parse_f64(hi_s)?;
        if !(lo > 0.0 && hi > lo) {
            return Err(QeegError::invalid_param(format!(
                "{label} band range must satisfy 0 < LO < HI: {token}"
            )));
        }
        return Ok(BandDefinition::new(label, lo, hi));
    }

    Err(QeegError::invalid_param(format!(
        "{label} band not found (name) and not a range (LO-HI): {token}"
    )))
}

pub(crate) fn parse_f64(s: &str) -> QeegResult<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|e| QeegError::invalid_param(format!("failed to parse number '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands_have_expected_edges() {
        let bands = default_eeg_bands();
        assert_eq!(bands.len(), 5);
        assert_eq!(bands[1].name, "theta");
        assert_eq!(bands[1].fmin_hz, 4.0);
        assert_eq!(bands[1].fmax_hz, 7.0);
    }

    #[test]
    fn parse_spec_roundtrip() {
        let bands = parse_band_spec("smr:12-15, hibeta:22-36").unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].name, "smr");
        assert_eq!(bands[1].fmax_hz, 36.0);
    }

    #[test]
    fn empty_spec_falls_back_to_defaults() {
        assert_eq!(parse_band_spec("").unwrap(), default_eeg_bands());
        assert_eq!(parse_band_spec(" , ,").unwrap(), default_eeg_bands());
    }

    #[test]
    fn parse_spec_rejects_bad_ranges() {
        assert!(parse_band_spec("alpha:12-8").is_err());
        assert!(parse_band_spec("alpha").is_err());
        assert!(parse_band_spec("alpha:x-y").is_err());
    }

    #[test]
    fn resolve_by_name_is_case_insensitive() {
        let bands = default_eeg_bands();
        let b = resolve_band_token(&bands, "ALPHA", "phase").unwrap();
        assert_eq!(b.fmin_hz, 8.0);
    }

    #[test]
    fn resolve_explicit_range() {
        let bands = default_eeg_bands();
        let b = resolve_band_token(&bands, "70-90", "amplitude").unwrap();
        assert_eq!(b.name, "amplitude");
        assert_eq!(b.fmin_hz, 70.0);
        assert_eq!(b.fmax_hz, 90.0);
        assert!(resolve_band_token(&bands, "90-70", "amplitude").is_err());
        assert!(resolve_band_token(&bands, "sigma", "amplitude").is_err());
    }
}
