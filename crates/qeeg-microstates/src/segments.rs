//! Label-run segmentation of a microstate sequence

use qeeg_core::{QeegError, QeegResult};

/// One maximal run of identical labels.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MicrostateSegment {
    /// State index, or -1 for undefined samples.
    pub label: i32,
    pub start_sample: usize,
    /// Exclusive end sample.
    pub end_sample: usize,
    pub start_sec: f64,
    pub end_sec: f64,
    pub duration_sec: f64,
    /// Arithmetic mean of the per-sample correlations in the run.
    pub mean_corr: f64,
    /// Arithmetic mean of the GFP in the run.
    pub mean_gfp: f64,
}

/// Walk the label stream and return its maximal runs.
///
/// `labels`, `corr`, and `gfp` must have equal lengths; undefined runs
/// (`label == -1`) are skipped unless `include_undefined` is set.
pub fn microstate_segments(
    labels: &[i32],
    corr: &[f64],
    gfp: &[f64],
    fs_hz: f64,
    include_undefined: bool,
) -> QeegResult<Vec<MicrostateSegment>> {
    if !(fs_hz > 0.0) {
        return Err(QeegError::invalid_param("fs_hz must be > 0"));
    }
    if labels.len() != corr.len() || labels.len() != gfp.len() {
        return Err(QeegError::invalid_param(
            "labels, corr, gfp must have the same length",
        ));
    }

    let n = labels.len();
    let mut segs = Vec::new();
    let mut i = 0usize;
    while i < n {
        let lab = labels[i];
        let mut j = i + 1;
        let mut sum_corr = corr[i];
        let mut sum_gfp = gfp[i];
        while j < n && labels[j] == lab {
            sum_corr += corr[j];
            sum_gfp += gfp[j];
            j += 1;
        }
        let len = j - i;
        if include_undefined || lab >= 0 {
            segs.push(MicrostateSegment {
                label: lab,
                start_sample: i,
                end_sample: j,
                start_sec: i as f64 / fs_hz,
                end_sec: j as f64 / fs_hz,
                duration_sec: len as f64 / fs_hz,
                mean_corr: sum_corr / len as f64,
                mean_gfp: sum_gfp / len as f64,
            });
        }
        i = j;
    }
    Ok(segs)
}
