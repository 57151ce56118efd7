//! Smoothing filters: separable Gaussian blur and the edge-preserving
//! bilateral filter. Both reflect the border (`gfedcb|abcdefgh|gfedcba`).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::types::Plane;

/// Bilateral filter parameters. Intensity sigma is expressed in the units of
/// the filtered plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilateralParams {
    /// Neighborhood width; even values are widened by one to stay centred
    pub diameter: usize,
    pub sigma_space: f32,
    pub sigma_color: f32,
}

impl Default for BilateralParams {
    fn default() -> Self {
        Self {
            diameter: 30,
            sigma_space: 5.0,
            sigma_color: 15.0,
        }
    }
}

impl BilateralParams {
    pub fn validate(&self) -> Result<()> {
        if self.diameter == 0 {
            return Err(FusionError::InvalidParameter(
                "bilateral diameter must be at least 1".to_string(),
            ));
        }
        for (name, sigma) in [
            ("sigma_space", self.sigma_space),
            ("sigma_color", self.sigma_color),
        ] {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(FusionError::InvalidParameter(format!(
                    "bilateral {} must be positive, got {}",
                    name, sigma
                )));
            }
        }
        Ok(())
    }
}

/// Reflect-101 index into `0..n`.
#[inline]
pub(crate) fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// Edge-preserving smoothing.
///
/// Each output sample is the average of its square neighborhood weighted by
/// `exp(-d²/2σs²) · exp(-Δ²/2σc²)`, where `d` is the spatial distance and `Δ`
/// the intensity difference to the centre sample. The sum is accumulated as
/// an offset from the centre, so a constant neighborhood reproduces its value
/// exactly.
pub fn bilateral_filter(plane: &Plane, params: &BilateralParams) -> Result<Plane> {
    params.validate()?;
    let (w, h) = (plane.width(), plane.height());
    let radius = (params.diameter / 2) as isize;
    let space_coeff = -0.5 / (params.sigma_space * params.sigma_space);
    let color_coeff = -0.5 / (params.sigma_color * params.sigma_color);

    let mut offsets = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = (dx * dx + dy * dy) as f32;
            offsets.push((dx, dy, (space_coeff * d2).exp()));
        }
    }

    let src = plane.data();
    let mut out = vec![0.0f32; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, dst) in row.iter_mut().enumerate() {
            let centre = src[y * w + x];
            let mut weighted = 0.0f64;
            let mut total = 0.0f64;
            for &(dx, dy, space_weight) in &offsets {
                let sx = reflect_101(x as isize + dx, w);
                let sy = reflect_101(y as isize + dy, h);
                let diff = src[sy * w + sx] - centre;
                let weight = space_weight * (color_coeff * diff * diff).exp();
                weighted += (weight * diff) as f64;
                total += weight as f64;
            }
            *dst = centre + (weighted / total) as f32;
        }
    });

    Plane::new(w, h, out)
}

/// Normalized 1-D Gaussian kernel of radius `ceil(3σ)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as isize;
    let coeff = -0.5 / (sigma * sigma);
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (coeff * (i * i) as f32).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Separable Gaussian blur. A non-positive sigma returns the input unchanged.
pub fn gaussian_blur(plane: &Plane, sigma: f32) -> Plane {
    if !(sigma > 0.0) {
        return plane.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let (w, h) = (plane.width(), plane.height());
    let src = plane.data();

    let mut horizontal = vec![0.0f32; w * h];
    horizontal
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, dst) in row.iter_mut().enumerate() {
                *dst = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, &kv)| {
                        let sx = reflect_101(x as isize + k as isize - radius, w);
                        kv * src[y * w + sx]
                    })
                    .sum();
            }
        });

    let mut out = vec![0.0f32; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, dst) in row.iter_mut().enumerate() {
            *dst = kernel
                .iter()
                .enumerate()
                .map(|(k, &kv)| {
                    let sy = reflect_101(y as isize + k as isize - radius, h);
                    kv * horizontal[sy * w + x]
                })
                .sum();
        }
    });

    Plane::from_fn(w, h, |x, y| out[y * w + x])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_edge(w: usize, h: usize, lo: f32, hi: f32) -> Plane {
        Plane::from_fn(w, h, |x, _| if x < w / 2 { lo } else { hi })
    }

    #[test]
    fn test_reflect_101_indices() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-7, 3), 1);
        assert_eq!(reflect_101(4, 1), 0);
    }

    #[test]
    fn test_bilateral_reproduces_constant_plane_exactly() {
        let plane = Plane::filled(20, 12, 87.25);
        let out = bilateral_filter(&plane, &BilateralParams::default()).unwrap();
        assert_eq!(out, plane);
    }

    #[test]
    fn test_bilateral_preserves_strong_edges() {
        let plane = step_edge(40, 10, 20.0, 220.0);
        let out = bilateral_filter(&plane, &BilateralParams::default()).unwrap();
        // A 200-level step is far outside sigma_color = 15.
        assert!((out.get(19, 5) - 20.0).abs() < 0.5);
        assert!((out.get(20, 5) - 220.0).abs() < 0.5);
    }

    #[test]
    fn test_bilateral_smooths_small_ripples() {
        let plane = Plane::from_fn(32, 32, |x, y| {
            100.0 + if (x + y) % 2 == 0 { 2.0 } else { -2.0 }
        });
        let out = bilateral_filter(&plane, &BilateralParams::default()).unwrap();
        for &v in out.data() {
            assert!((v - 100.0).abs() < 0.5, "ripple survived: {}", v);
        }
    }

    #[test]
    fn test_bilateral_rejects_bad_params() {
        let plane = Plane::filled(4, 4, 1.0);
        let params = BilateralParams {
            diameter: 0,
            ..Default::default()
        };
        assert!(bilateral_filter(&plane, &params).is_err());
        let params = BilateralParams {
            sigma_color: -1.0,
            ..Default::default()
        };
        assert!(bilateral_filter(&plane, &params).is_err());
    }

    #[test]
    fn test_gaussian_blur_keeps_mean_and_flattens_impulse() {
        let mut plane = Plane::filled(15, 15, 0.0);
        plane.set(7, 7, 1.0);
        let blurred = gaussian_blur(&plane, 1.0);
        let total: f32 = blurred.data().iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(blurred.get(7, 7) < 0.2);
        assert!(blurred.get(7, 7) > blurred.get(8, 7));
    }
}
