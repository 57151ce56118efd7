//! Registration configuration types

use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::registration::types::WarpSource;

/// Keypoint detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Strongest keypoints kept per image
    pub max_features: usize,
    /// Scale-space levels searched
    pub pyramid_levels: usize,
    /// Downscale between consecutive levels
    pub scale_step: f32,
    /// Gaussian pre-smoothing applied on every level
    pub blur_sigma: f32,
    /// Harris sensitivity `k` in `det(M) - k·trace(M)²`
    pub harris_k: f32,
    /// Gaussian window of the structure tensor
    pub window_sigma: f32,
    /// Minimum response as a fraction of the strongest response on a level
    pub response_threshold: f32,
    /// Half-width of the non-maximum suppression window
    pub nms_radius: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            pyramid_levels: 12,
            scale_step: 2f32.powf(1.0 / 6.0),
            blur_sigma: 1.0,
            harris_k: 0.04,
            window_sigma: 1.5,
            response_threshold: 0.001,
            nms_radius: 3,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 || self.pyramid_levels == 0 || self.nms_radius == 0 {
            return Err(FusionError::ConfigError(
                "max_features, pyramid_levels and nms_radius must be at least 1".to_string(),
            ));
        }
        if !(self.window_sigma > 0.0) || self.blur_sigma < 0.0 {
            return Err(FusionError::ConfigError(format!(
                "detector sigmas out of range: window {}, blur {}",
                self.window_sigma, self.blur_sigma
            )));
        }
        if !(self.scale_step > 1.0 && self.scale_step <= 2.0) {
            return Err(FusionError::ConfigError(format!(
                "scale_step must be in (1, 2], got {}",
                self.scale_step
            )));
        }
        if !(0.0..1.0).contains(&self.response_threshold) {
            return Err(FusionError::ConfigError(format!(
                "response_threshold must be in [0, 1), got {}",
                self.response_threshold
            )));
        }
        Ok(())
    }
}

/// Configuration for feature-based registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Nearest/second-nearest descriptor distance ratio a match must beat
    pub ratio_threshold: f32,
    /// Fewest ratio-test survivors accepted before fitting a homography
    pub min_match_count: usize,
    /// Reprojection error (pixels) under which a correspondence is an inlier
    pub ransac_reproj_threshold: f64,
    pub ransac_max_iterations: usize,
    /// Probability of drawing one outlier-free sample, drives early stopping
    pub ransac_confidence: f64,
    /// Smallest consensus set a model needs to be accepted
    pub ransac_min_inliers: usize,
    pub ransac_seed: u64,
    /// Homographies with `|det|` at or below this are singular
    pub min_determinant: f64,
    pub warp_source: WarpSource,
    /// Fill for pixels the warp cannot source, as a fraction in `[0, 1]` of
    /// the image's sample range
    pub fill_value: f32,
    /// Histogram-equalize both intensity images before detection
    pub equalize_intensity: bool,
    pub detector: DetectorConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.7,
            min_match_count: 10,
            ransac_reproj_threshold: 5.0,
            ransac_max_iterations: 2000,
            ransac_confidence: 0.995,
            ransac_min_inliers: 8,
            ransac_seed: 0,
            min_determinant: 1e-6,
            warp_source: WarpSource::Rgb,
            fill_value: 0.0,
            equalize_intensity: false,
            detector: DetectorConfig::default(),
        }
    }
}

impl RegistrationConfig {
    pub fn builder() -> RegistrationConfigBuilder {
        RegistrationConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0) {
            return Err(FusionError::ConfigError(format!(
                "ratio_threshold must be in (0, 1], got {}",
                self.ratio_threshold
            )));
        }
        if self.min_match_count < 4 || self.ransac_min_inliers < 4 {
            return Err(FusionError::ConfigError(format!(
                "a homography needs at least 4 points (min_match_count {}, ransac_min_inliers {})",
                self.min_match_count, self.ransac_min_inliers
            )));
        }
        if !(self.ransac_reproj_threshold > 0.0) || self.ransac_max_iterations == 0 {
            return Err(FusionError::ConfigError(
                "RANSAC needs a positive threshold and at least one iteration".to_string(),
            ));
        }
        if !(self.ransac_confidence > 0.0 && self.ransac_confidence < 1.0) {
            return Err(FusionError::ConfigError(format!(
                "ransac_confidence must be in (0, 1), got {}",
                self.ransac_confidence
            )));
        }
        if !(self.min_determinant >= 0.0) {
            return Err(FusionError::ConfigError(format!(
                "min_determinant must be non-negative, got {}",
                self.min_determinant
            )));
        }
        if !(0.0..=1.0).contains(&self.fill_value) {
            return Err(FusionError::ConfigError(format!(
                "fill_value is a fraction of the sample range and must be in [0, 1], got {}",
                self.fill_value
            )));
        }
        self.detector.validate()
    }
}

/// Builder for RegistrationConfig
#[derive(Default)]
pub struct RegistrationConfigBuilder {
    ratio_threshold: Option<f32>,
    min_match_count: Option<usize>,
    ransac_reproj_threshold: Option<f64>,
    ransac_max_iterations: Option<usize>,
    ransac_min_inliers: Option<usize>,
    ransac_seed: Option<u64>,
    warp_source: Option<WarpSource>,
    fill_value: Option<f32>,
    equalize_intensity: Option<bool>,
    detector: Option<DetectorConfig>,
}

impl RegistrationConfigBuilder {
    pub fn ratio_threshold(mut self, ratio: f32) -> Self {
        self.ratio_threshold = Some(ratio);
        self
    }

    pub fn min_match_count(mut self, count: usize) -> Self {
        self.min_match_count = Some(count);
        self
    }

    pub fn ransac_reproj_threshold(mut self, pixels: f64) -> Self {
        self.ransac_reproj_threshold = Some(pixels);
        self
    }

    pub fn ransac_max_iterations(mut self, iterations: usize) -> Self {
        self.ransac_max_iterations = Some(iterations);
        self
    }

    pub fn ransac_min_inliers(mut self, inliers: usize) -> Self {
        self.ransac_min_inliers = Some(inliers);
        self
    }

    pub fn ransac_seed(mut self, seed: u64) -> Self {
        self.ransac_seed = Some(seed);
        self
    }

    pub fn warp_source(mut self, source: WarpSource) -> Self {
        self.warp_source = Some(source);
        self
    }

    pub fn fill_value(mut self, value: f32) -> Self {
        self.fill_value = Some(value);
        self
    }

    pub fn equalize_intensity(mut self, enable: bool) -> Self {
        self.equalize_intensity = Some(enable);
        self
    }

    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn build(self) -> RegistrationConfig {
        let default = RegistrationConfig::default();
        RegistrationConfig {
            ratio_threshold: self.ratio_threshold.unwrap_or(default.ratio_threshold),
            min_match_count: self.min_match_count.unwrap_or(default.min_match_count),
            ransac_reproj_threshold: self
                .ransac_reproj_threshold
                .unwrap_or(default.ransac_reproj_threshold),
            ransac_max_iterations: self
                .ransac_max_iterations
                .unwrap_or(default.ransac_max_iterations),
            ransac_confidence: default.ransac_confidence,
            ransac_min_inliers: self.ransac_min_inliers.unwrap_or(default.ransac_min_inliers),
            ransac_seed: self.ransac_seed.unwrap_or(default.ransac_seed),
            min_determinant: default.min_determinant,
            warp_source: self.warp_source.unwrap_or(default.warp_source),
            fill_value: self.fill_value.unwrap_or(default.fill_value),
            equalize_intensity: self.equalize_intensity.unwrap_or(default.equalize_intensity),
            detector: self.detector.unwrap_or(default.detector),
        }
    }
}
