//! Feature-based registration module
//!
//! Aligns the RGB and NIR frames of a capture: keypoints are detected in
//! both intensity images, matched under the ratio test, a homography is fit
//! with RANSAC and one frame is warped into the other's pixel grid.

pub mod config;
pub mod detector;
pub mod homography;
pub mod matcher;
pub mod registrar;
pub mod types;
pub mod warp;

pub use config::{DetectorConfig, RegistrationConfig, RegistrationConfigBuilder};
pub use detector::FeatureDetector;
pub use homography::{HomographyEstimate, RansacParams, estimate_dlt, estimate_ransac};
pub use matcher::{NearestPair, cross_check, match_keypoints, nearest_two, ratio_test};
pub use registrar::FeatureRegistrar;
pub use types::{
    DESCRIPTOR_LEN, Homography, Keypoint, Match, PointCorrespondence, RegisteredPair, WarpSource,
};
pub use warp::warp_perspective;
