use tracing::{debug, info, info_span, instrument};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::{Plane, RasterImage, equalize_histogram, luma, normalize};
use crate::image_pipeline::registration::config::RegistrationConfig;
use crate::image_pipeline::registration::detector::FeatureDetector;
use crate::image_pipeline::registration::homography::{RansacParams, estimate_ransac};
use crate::image_pipeline::registration::matcher::match_keypoints;
use crate::image_pipeline::registration::types::{
    Keypoint, PointCorrespondence, RegisteredPair, WarpSource,
};
use crate::image_pipeline::registration::warp::warp_perspective;

const EQUALIZATION_LEVELS: usize = 256;

/// Aligns an RGB frame and an NIR frame of the same scene.
pub struct FeatureRegistrar {
    config: RegistrationConfig,
    detector: FeatureDetector,
}

impl FeatureRegistrar {
    pub fn new(config: RegistrationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: FeatureDetector::new(config.detector.clone()),
            config,
        })
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Single-channel `[0, 1]` intensity used for keypoint detection.
    fn intensity(&self, image: &RasterImage) -> Result<Plane> {
        let plane = normalize(&luma(image)?)?;
        if self.config.equalize_intensity {
            equalize_histogram(&plane, EQUALIZATION_LEVELS)
        } else {
            Ok(plane)
        }
    }

    /// Keypoints of one image, in its own pixel coordinates.
    pub fn detect(&self, image: &RasterImage) -> Result<Vec<Keypoint>> {
        image.ensure_finite("input")?;
        Ok(self.detector.detect(&self.intensity(image)?))
    }

    /// Detects, matches and warps so that both images share one pixel grid.
    ///
    /// With [`WarpSource::Rgb`] the RGB frame is resampled into the NIR frame;
    /// with [`WarpSource::Nir`] the reverse.
    #[instrument(skip_all, fields(rgb = ?rgb.dimensions(), nir = ?nir.dimensions()))]
    pub fn register(&self, rgb: &RasterImage, nir: &RasterImage) -> Result<RegisteredPair> {
        check_inputs(rgb, nir)?;
        let (source, target) = self.ordered(rgb, nir);

        let (source_points, target_points) = {
            let _span = info_span!("detect_keypoints").entered();
            (self.detect(source)?, self.detect(target)?)
        };
        debug!(
            source = source_points.len(),
            target = target_points.len(),
            "Keypoints detected"
        );

        let matches = {
            let _span = info_span!("match_descriptors").entered();
            match_keypoints(&source_points, &target_points, self.config.ratio_threshold)
        };
        info!(matches = matches.len(), "Ratio test complete");

        let correspondences: Vec<PointCorrespondence> = matches
            .iter()
            .map(|m| {
                let s = &source_points[m.source];
                let t = &target_points[m.target];
                PointCorrespondence::new([s.x as f64, s.y as f64], [t.x as f64, t.y as f64])
            })
            .collect();

        self.fit_and_warp(rgb, nir, &correspondences)
    }

    /// Registers from caller-supplied point pairs, skipping detection and
    /// matching. Each correspondence maps a point in the warped image onto
    /// the reference image.
    #[instrument(skip_all, fields(correspondences = correspondences.len()))]
    pub fn register_with_correspondences(
        &self,
        rgb: &RasterImage,
        nir: &RasterImage,
        correspondences: &[PointCorrespondence],
    ) -> Result<RegisteredPair> {
        check_inputs(rgb, nir)?;
        self.fit_and_warp(rgb, nir, correspondences)
    }

    fn ordered<'a>(
        &self,
        rgb: &'a RasterImage,
        nir: &'a RasterImage,
    ) -> (&'a RasterImage, &'a RasterImage) {
        match self.config.warp_source {
            WarpSource::Rgb => (rgb, nir),
            WarpSource::Nir => (nir, rgb),
        }
    }

    fn fit_and_warp(
        &self,
        rgb: &RasterImage,
        nir: &RasterImage,
        correspondences: &[PointCorrespondence],
    ) -> Result<RegisteredPair> {
        if correspondences.len() < self.config.min_match_count {
            return Err(FusionError::InsufficientMatches {
                found: correspondences.len(),
                required: self.config.min_match_count,
            });
        }

        let estimate = {
            let _span = info_span!("estimate_homography").entered();
            estimate_ransac(correspondences, &RansacParams::from(&self.config))?
        };
        info!(
            inliers = estimate.inlier_count,
            mean_error = estimate.mean_error,
            "Homography accepted"
        );

        let _span = info_span!("warp").entered();
        let (source, target) = self.ordered(rgb, nir);
        let warped = warp_perspective(
            source,
            &estimate.homography,
            target.width(),
            target.height(),
            self.config.fill_value * source.sample_type().range(),
        )?;
        let (rgb, nir) = match self.config.warp_source {
            WarpSource::Rgb => (warped, nir.clone()),
            WarpSource::Nir => (rgb.clone(), warped),
        };

        RegisteredPair::from_registration(
            rgb,
            nir,
            estimate.homography,
            self.config.warp_source,
            correspondences.len(),
            estimate.inlier_count,
        )
    }
}

fn check_inputs(rgb: &RasterImage, nir: &RasterImage) -> Result<()> {
    rgb.ensure_channels(3, "RGB")?;
    nir.ensure_channels(1, "NIR")?;
    if rgb.sample_type() != nir.sample_type() {
        return Err(FusionError::InvalidImageDimensions(format!(
            "RGB samples are {:?} but NIR samples are {:?}",
            rgb.sample_type(),
            nir.sample_type()
        )));
    }
    rgb.ensure_finite("RGB")?;
    nir.ensure_finite("NIR")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Grey-level scene of overlapping rectangles.
    fn scene(size: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pixels = vec![40u8; size * size];
        for _ in 0..14 {
            let x0 = rng.gen_range(4..size - 20);
            let y0 = rng.gen_range(4..size - 20);
            let w = rng.gen_range(8..18);
            let h = rng.gen_range(8..18);
            let v = rng.gen_range(80..250) as u8;
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    pixels[y * size + x] = v;
                }
            }
        }
        pixels
    }

    fn grey_rgb(size: usize, pixels: &[u8]) -> RasterImage {
        let data: Vec<u8> = pixels.iter().flat_map(|&v| [v, v, v]).collect();
        RasterImage::from_u8(size, size, 3, &data).unwrap()
    }

    #[test]
    fn test_identical_pair_registers_to_identity() {
        let size = 96;
        let pixels = scene(size, 11);
        let rgb = grey_rgb(size, &pixels);
        let nir = RasterImage::from_u8(size, size, 1, &pixels).unwrap();

        let registrar = FeatureRegistrar::new(RegistrationConfig::default()).unwrap();
        let pair = registrar.register(&rgb, &nir).unwrap();

        let h = pair.homography();
        for corner in [[0.0, 0.0], [95.0, 0.0], [0.0, 95.0], [95.0, 95.0]] {
            let p = h.project(corner[0], corner[1]).unwrap();
            assert!(
                (p[0] - corner[0]).hypot(p[1] - corner[1]) < 1.0,
                "corner {:?} moved to {:?}",
                corner,
                p
            );
        }
        assert!(pair.inlier_count() >= 8);

        let diff: f32 = pair
            .rgb()
            .data()
            .iter()
            .zip(rgb.data())
            .map(|(a, b)| (a - b).abs())
            .sum::<f32>()
            / rgb.data().len() as f32;
        assert!(diff < 4.0, "warped image drifted by {} on average", diff);
        assert_eq!(pair.nir(), &nir);
    }

    #[test]
    fn test_unrelated_noise_has_insufficient_matches() {
        let size = 64;
        let mut rng = StdRng::seed_from_u64(5);
        let a: Vec<u8> = (0..size * size * 3).map(|_| rng.r#gen()).collect();
        let b: Vec<u8> = (0..size * size).map(|_| rng.r#gen()).collect();
        let rgb = RasterImage::from_u8(size, size, 3, &a).unwrap();
        let nir = RasterImage::from_u8(size, size, 1, &b).unwrap();

        let registrar = FeatureRegistrar::new(RegistrationConfig::default()).unwrap();
        assert!(matches!(
            registrar.register(&rgb, &nir),
            Err(FusionError::InsufficientMatches { .. })
        ));
    }

    #[test]
    fn test_constant_image_is_rejected() {
        let rgb = RasterImage::from_u8(32, 32, 3, &[90; 32 * 32 * 3]).unwrap();
        let nir = RasterImage::from_u8(32, 32, 1, &[90; 32 * 32]).unwrap();
        let registrar = FeatureRegistrar::new(RegistrationConfig::default()).unwrap();
        assert!(matches!(
            registrar.register(&rgb, &nir),
            Err(FusionError::DegenerateChannel(_))
        ));
    }

    #[test]
    fn test_channel_mismatch_is_rejected() {
        let rgb = RasterImage::from_u8(8, 8, 1, &[0; 64]).unwrap();
        let nir = RasterImage::from_u8(8, 8, 1, &[0; 64]).unwrap();
        let registrar = FeatureRegistrar::new(RegistrationConfig::default()).unwrap();
        assert!(matches!(
            registrar.register(&rgb, &nir),
            Err(FusionError::InvalidImageDimensions(_))
        ));
    }

    #[test]
    fn test_correspondences_drive_warp_direction() {
        let size = 40;
        let rgb = grey_rgb(size, &scene(size, 2));
        let nir = RasterImage::from_u8(size + 8, size, 1, &vec![10; (size + 8) * size]).unwrap();
        let correspondences: Vec<_> = (0..16)
            .map(|i| {
                let s = [(i % 4) as f64 * 9.0 + 2.0, (i / 4) as f64 * 9.0 + 1.0];
                PointCorrespondence::new(s, [s[0] + 3.0, s[1] + 2.0])
            })
            .collect();

        let registrar = FeatureRegistrar::new(RegistrationConfig::default()).unwrap();
        let pair = registrar
            .register_with_correspondences(&rgb, &nir, &correspondences)
            .unwrap();
        assert_eq!(pair.dimensions(), (size + 8, size));
        assert_eq!(pair.rgb().dimensions(), (size + 8, size));
        assert_eq!(pair.rgb().get(0, 0, 0), 0.0);
        assert_abs_diff_eq!(pair.rgb().get(13, 12, 1), rgb.get(10, 10, 1), epsilon = 1e-2);
        assert_eq!(pair.warped_source(), WarpSource::Rgb);
        assert_eq!(pair.inlier_count(), 16);
    }

    #[test]
    fn test_too_few_correspondences_fail_before_fitting() {
        let rgb = grey_rgb(16, &[0; 256]);
        let nir = RasterImage::from_u8(16, 16, 1, &[0; 256]).unwrap();
        let registrar = FeatureRegistrar::new(RegistrationConfig::default()).unwrap();
        let few = vec![PointCorrespondence::new([0.0, 0.0], [1.0, 1.0]); 5];
        assert!(matches!(
            registrar.register_with_correspondences(&rgb, &nir, &few),
            Err(FusionError::InsufficientMatches { found: 5, required: 10 })
        ));
    }
}
