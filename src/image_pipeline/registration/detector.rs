//! Multi-scale Harris keypoints with oriented patch descriptors.
//!
//! The intensity plane is resampled into a scale space whose levels shrink
//! by `scale_step` each. Every level is smoothed, scored with the Harris
//! structure-tensor response, thinned by non-maximum suppression and refined
//! to sub-pixel precision. Orientation comes from the intensity centroid of a
//! disc around the corner; the descriptor samples an 8×8 grid rotated to that
//! orientation. Both are measured in level pixels, so a keypoint's footprint
//! in the original image grows with its scale and two views that differ by a
//! zoom meet on levels no more than half a step apart.

use tracing::debug;

use crate::image_pipeline::raster::filter::reflect_101;
use crate::image_pipeline::raster::{Plane, gaussian_blur};
use crate::image_pipeline::registration::config::DetectorConfig;
use crate::image_pipeline::registration::types::{DESCRIPTOR_LEN, Keypoint};

const PATCH_GRID: usize = 8;
const PATCH_SPACING: f32 = 3.0;
const ORIENTATION_RADIUS: isize = 8;
/// Keeps the orientation disc and most of the sampling grid inside the level.
const BORDER: usize = 12;
const MIN_RESPONSE: f32 = 1e-12;
/// Anti-aliasing blur per unit of downscale, `σ = 0.5·√(s² - 1)`.
const ANTIALIAS_SIGMA: f32 = 0.5;

pub struct FeatureDetector {
    config: DetectorConfig,
}

impl FeatureDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detects keypoints in an intensity plane normalized to `[0, 1]`.
    ///
    /// Results are ordered by descending response, ties broken by position,
    /// so identical inputs always yield identical keypoint lists.
    pub fn detect(&self, intensity: &Plane) -> Vec<Keypoint> {
        let config = &self.config;
        let levels = build_scale_space(intensity, config.pyramid_levels, config.scale_step);
        let mut keypoints = Vec::new();

        for (level, (scale, image)) in levels.iter().enumerate() {
            let smoothed = gaussian_blur(image, config.blur_sigma);
            let response = harris_response(&smoothed, config.harris_k, config.window_sigma);
            let corners = local_maxima(&response, config.response_threshold, config.nms_radius);
            let before = keypoints.len();

            for (x, y, strength) in corners {
                let (fx, fy) = refine_subpixel(&response, x, y);
                let orientation = intensity_centroid_angle(&smoothed, x, y);
                if let Some(descriptor) = describe(&smoothed, fx, fy, orientation) {
                    keypoints.push(Keypoint {
                        x: fx * scale,
                        y: fy * scale,
                        scale: *scale,
                        orientation,
                        response: strength,
                        descriptor,
                    });
                }
            }
            debug!(
                level,
                scale,
                width = image.width(),
                height = image.height(),
                keypoints = keypoints.len() - before,
                "Scale level scanned"
            );
        }

        keypoints.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.y.total_cmp(&b.y))
                .then(a.x.total_cmp(&b.x))
        });
        keypoints.truncate(config.max_features);
        keypoints
    }
}

/// Level `i` is the base blurred against aliasing and resampled by
/// `step^i`, paired with that scale. Level pixel `(x, y)` sits at
/// `(x·s, y·s)` in the base. Stops early once a level would be too small to
/// hold a descriptor away from its border.
fn build_scale_space(base: &Plane, levels: usize, step: f32) -> Vec<(f32, Plane)> {
    let min_side = 2 * BORDER + 1;
    let mut space = vec![(1.0, base.clone())];
    for level in 1..levels {
        let scale = step.powi(level as i32);
        let w = (base.width() as f32 / scale) as usize;
        let h = (base.height() as f32 / scale) as usize;
        if w < min_side || h < min_side {
            break;
        }
        let blurred = gaussian_blur(base, ANTIALIAS_SIGMA * (scale * scale - 1.0).sqrt());
        let resampled = Plane::from_fn(w, h, |x, y| {
            blurred.sample_bilinear(x as f32 * scale, y as f32 * scale)
        });
        space.push((scale, resampled));
    }
    space
}

/// `det(M) - k·trace(M)²` of the Gaussian-windowed structure tensor.
fn harris_response(image: &Plane, k: f32, window_sigma: f32) -> Plane {
    let (w, h) = (image.width(), image.height());
    let at = |x: isize, y: isize| image.get(reflect_101(x, w), reflect_101(y, h));

    let mut ixx = Plane::filled(w, h, 0.0);
    let mut iyy = Plane::filled(w, h, 0.0);
    let mut ixy = Plane::filled(w, h, 0.0);
    for y in 0..h {
        for x in 0..w {
            let (xi, yi) = (x as isize, y as isize);
            // Sobel, scaled to a unit-step response.
            let gx = (at(xi + 1, yi - 1) + 2.0 * at(xi + 1, yi) + at(xi + 1, yi + 1)
                - at(xi - 1, yi - 1)
                - 2.0 * at(xi - 1, yi)
                - at(xi - 1, yi + 1))
                / 8.0;
            let gy = (at(xi - 1, yi + 1) + 2.0 * at(xi, yi + 1) + at(xi + 1, yi + 1)
                - at(xi - 1, yi - 1)
                - 2.0 * at(xi, yi - 1)
                - at(xi + 1, yi - 1))
                / 8.0;
            ixx.set(x, y, gx * gx);
            iyy.set(x, y, gy * gy);
            ixy.set(x, y, gx * gy);
        }
    }

    let sxx = gaussian_blur(&ixx, window_sigma);
    let syy = gaussian_blur(&iyy, window_sigma);
    let sxy = gaussian_blur(&ixy, window_sigma);

    Plane::from_fn(w, h, |x, y| {
        let (a, b, c) = (sxx.get(x, y), syy.get(x, y), sxy.get(x, y));
        let trace = a + b;
        a * b - c * c - k * trace * trace
    })
}

/// Strict local maxima above `relative · max(response)`, away from the
/// border. Plateaus keep only their first sample in raster order.
fn local_maxima(response: &Plane, relative: f32, radius: usize) -> Vec<(usize, usize, f32)> {
    let (w, h) = (response.width(), response.height());
    if w <= 2 * BORDER || h <= 2 * BORDER {
        return Vec::new();
    }

    let mut strongest = 0.0f32;
    for y in BORDER..h - BORDER {
        for x in BORDER..w - BORDER {
            strongest = strongest.max(response.get(x, y));
        }
    }
    let floor = (strongest * relative).max(MIN_RESPONSE);

    let r = radius as isize;
    let mut maxima = Vec::new();
    for y in BORDER..h - BORDER {
        'pixel: for x in BORDER..w - BORDER {
            let v = response.get(x, y);
            if v <= floor {
                continue;
            }
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = reflect_101(x as isize + dx, w);
                    let ny = reflect_101(y as isize + dy, h);
                    let n = response.get(nx, ny);
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if n > v || (earlier && n == v) {
                        continue 'pixel;
                    }
                }
            }
            maxima.push((x, y, v));
        }
    }
    maxima
}

/// Quadratic peak interpolation along each axis, offsets limited to ±0.5.
fn refine_subpixel(response: &Plane, x: usize, y: usize) -> (f32, f32) {
    let offset = |minus: f32, centre: f32, plus: f32| {
        let curvature = minus - 2.0 * centre + plus;
        if curvature < 0.0 {
            (0.5 * (minus - plus) / curvature).clamp(-0.5, 0.5)
        } else {
            0.0
        }
    };
    let c = response.get(x, y);
    let dx = offset(response.get(x - 1, y), c, response.get(x + 1, y));
    let dy = offset(response.get(x, y - 1), c, response.get(x, y + 1));
    (x as f32 + dx, y as f32 + dy)
}

fn intensity_centroid_angle(image: &Plane, x: usize, y: usize) -> f32 {
    let r2 = ORIENTATION_RADIUS * ORIENTATION_RADIUS;
    let (mut m10, mut m01) = (0.0f32, 0.0f32);
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = image.get((x as isize + dx) as usize, (y as isize + dy) as usize);
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

/// Rotated 8×8 grid of bilinear samples, made zero-mean and unit-norm.
/// Flat patches carry no information and yield `None`.
fn describe(image: &Plane, x: f32, y: f32, orientation: f32) -> Option<[f32; DESCRIPTOR_LEN]> {
    let (sin, cos) = orientation.sin_cos();
    let half = (PATCH_GRID as f32 - 1.0) / 2.0;
    let mut descriptor = [0.0f32; DESCRIPTOR_LEN];

    for j in 0..PATCH_GRID {
        for i in 0..PATCH_GRID {
            let u = (i as f32 - half) * PATCH_SPACING;
            let v = (j as f32 - half) * PATCH_SPACING;
            descriptor[j * PATCH_GRID + i] =
                image.sample_bilinear(x + cos * u - sin * v, y + sin * u + cos * v);
        }
    }

    let mean = descriptor.iter().sum::<f32>() / DESCRIPTOR_LEN as f32;
    descriptor.iter_mut().for_each(|d| *d -= mean);
    let norm = descriptor.iter().map(|d| d * d).sum::<f32>().sqrt();
    if norm < 1e-6 {
        return None;
    }
    descriptor.iter_mut().for_each(|d| *d /= norm);
    Some(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: usize, lo: usize, hi: usize) -> Plane {
        Plane::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_flat_plane_has_no_keypoints() {
        let detector = FeatureDetector::new(DetectorConfig::default());
        assert!(detector.detect(&Plane::filled(64, 64, 0.5)).is_empty());
    }

    #[test]
    fn test_square_corners_are_detected() {
        let detector = FeatureDetector::new(DetectorConfig {
            pyramid_levels: 1,
            ..Default::default()
        });
        let keypoints = detector.detect(&square(64, 20, 44));

        let corners = [(20.0, 20.0), (43.0, 20.0), (20.0, 43.0), (43.0, 43.0)];
        for (cx, cy) in corners {
            assert!(
                keypoints
                    .iter()
                    .any(|k| (k.x - cx).abs() <= 2.0 && (k.y - cy).abs() <= 2.0),
                "no keypoint near ({}, {})",
                cx,
                cy
            );
        }
        for k in &keypoints {
            let norm: f32 = k.descriptor.iter().map(|d| d * d).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = FeatureDetector::new(DetectorConfig::default());
        let plane = square(80, 25, 55);
        assert_eq!(detector.detect(&plane), detector.detect(&plane));
    }

    #[test]
    fn test_max_features_caps_output() {
        let detector = FeatureDetector::new(DetectorConfig {
            max_features: 2,
            ..Default::default()
        });
        assert!(detector.detect(&square(64, 20, 44)).len() <= 2);
    }

    #[test]
    fn test_scale_space_stops_before_levels_get_too_small() {
        let step = 2f32.powf(1.0 / 6.0);
        let space = build_scale_space(&Plane::filled(64, 64, 0.0), 12, step);
        // 64 / 2^(8/6) still leaves 25 pixels; the next level would not.
        assert_eq!(space.len(), 9);
        assert_eq!(space[0].1.width(), 64);
        assert_eq!(space[3].1.width(), 45);
        for pair in space.windows(2) {
            assert!((pair[1].0 / pair[0].0 - step).abs() < 1e-4);
        }
    }

    #[test]
    fn test_keypoints_come_from_several_levels() {
        let config = DetectorConfig::default();
        let step = config.scale_step;
        let keypoints = FeatureDetector::new(config).detect(&square(96, 30, 66));

        let mut levels: Vec<i32> = keypoints
            .iter()
            .map(|k| (k.scale.ln() / step.ln()).round() as i32)
            .collect();
        for (k, level) in keypoints.iter().zip(&levels) {
            assert!((k.scale - step.powi(*level)).abs() < 1e-4);
        }
        levels.sort_unstable();
        levels.dedup();
        assert!(levels.len() >= 2, "levels {:?}", levels);
    }
}
