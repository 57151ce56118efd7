//! Equal-width histograms and histogram-based thresholds.

use crate::image_pipeline::common::error::{FusionError, Result};

/// Counts over `counts.len()` equal-width bins; `edges` holds one more entry
/// than `counts`. The last bin is closed on the right.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub edges: Vec<f64>,
}

impl Histogram {
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.edges[0] + self.bin_width() * (bin as f64 + 0.5)
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Bins `values` over `[min, max]`. A constant input is binned over
/// `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f32], bin_count: usize) -> Result<Histogram> {
    if bin_count == 0 {
        return Err(FusionError::InvalidParameter(
            "histogram needs at least one bin".to_string(),
        ));
    }
    if values.is_empty() {
        return Err(FusionError::InvalidParameter(
            "histogram of an empty sample set".to_string(),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FusionError::InvalidParameter(
            "histogram input contains non-finite samples".to_string(),
        ));
    }

    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bin_count as f64;
    let mut edges: Vec<f64> = (0..bin_count).map(|i| lo + width * i as f64).collect();
    edges.push(hi);

    let mut counts = vec![0usize; bin_count];
    for &v in values {
        let bin = (((v as f64 - lo) / width) as usize).min(bin_count - 1);
        counts[bin] += 1;
    }

    Ok(Histogram { counts, edges })
}

/// Otsu's threshold over `bin_count` bins: the upper edge of the split that
/// maximizes between-class variance. Returns `None` when the values cannot be
/// split into two non-empty classes.
pub fn otsu_threshold(values: &[f32], bin_count: usize) -> Result<Option<f32>> {
    let hist = histogram(values, bin_count)?;
    let total = values.len() as f64;
    let total_sum: f64 = (0..hist.bin_count())
        .map(|i| hist.counts[i] as f64 * hist.bin_center(i))
        .sum();

    let mut best: Option<(usize, f64)> = None;
    let mut below = 0.0f64;
    let mut below_sum = 0.0f64;
    for k in 0..hist.bin_count() - 1 {
        below += hist.counts[k] as f64;
        below_sum += hist.counts[k] as f64 * hist.bin_center(k);
        let above = total - below;
        if below == 0.0 {
            continue;
        }
        if above == 0.0 {
            break;
        }
        let mean_below = below_sum / below;
        let mean_above = (total_sum - below_sum) / above;
        let variance = below * above * (mean_below - mean_above).powi(2);
        if best.is_none_or(|(_, v)| variance > v) {
            best = Some((k, variance));
        }
    }

    Ok(best.map(|(k, _)| hist.edges[k + 1] as f32))
}
