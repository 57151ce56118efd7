//! Tone operations: min-max normalization, gamma, histogram equalization and
//! simple statistics.

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::types::Plane;

/// Affine rescale of a plane to `[0, 1]`.
///
/// A constant plane has no range to stretch and is reported as
/// [`FusionError::DegenerateChannel`].
pub fn normalize(plane: &Plane) -> Result<Plane> {
    let (min, max) = plane.min_max();
    if !min.is_finite() || !max.is_finite() {
        return Err(FusionError::InvalidParameter(
            "cannot normalize a plane with non-finite samples".to_string(),
        ));
    }
    if max <= min {
        return Err(FusionError::DegenerateChannel(min));
    }
    let scale = 1.0 / (max - min);
    Ok(plane.map(|v| (v - min) * scale))
}

/// Elementwise `x^(1/gamma)`. Negative samples are treated as 0.
pub fn gamma_correct(plane: &Plane, gamma: f32) -> Result<Plane> {
    if !(gamma.is_finite() && gamma > 0.0) {
        return Err(FusionError::InvalidParameter(format!(
            "gamma must be positive and finite, got {}",
            gamma
        )));
    }
    let exponent = 1.0 / gamma;
    Ok(plane.map(|v| v.max(0.0).powf(exponent)))
}

/// Histogram equalization into `[0, 1]` over `levels` quantization steps.
pub fn equalize_histogram(plane: &Plane, levels: usize) -> Result<Plane> {
    if levels < 2 {
        return Err(FusionError::InvalidParameter(format!(
            "equalization needs at least 2 levels, got {}",
            levels
        )));
    }
    let unit = normalize(plane)?;
    let quantize = |v: f32| ((v * levels as f32) as usize).min(levels - 1);

    let mut cdf = vec![0usize; levels];
    for &v in unit.data() {
        cdf[quantize(v)] += 1;
    }
    for i in 1..levels {
        cdf[i] += cdf[i - 1];
    }

    // Lowest occupied level maps to 0.
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let denominator = (unit.len() - cdf_min) as f32;
    if denominator <= 0.0 {
        return Err(FusionError::DegenerateChannel(plane.data()[0]));
    }
    Ok(unit.map(|v| (cdf[quantize(v)] - cdf_min) as f32 / denominator))
}

pub fn mean(plane: &Plane) -> f32 {
    let sum: f64 = plane.data().iter().map(|&v| v as f64).sum();
    (sum / plane.len() as f64) as f32
}

/// Median of the samples (lower median for even counts).
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    let mid = (sorted.len() - 1) / 2;
    let (_, m, _) = sorted.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    Some(*m)
}
