//! Registration data types

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::RasterImage;

/// Length of every keypoint descriptor (an 8×8 sampling grid).
pub const DESCRIPTOR_LEN: usize = 64;

/// A detected interest point in level-0 pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Keypoint {
    /// Sub-pixel column
    pub x: f32,
    /// Sub-pixel row
    pub y: f32,
    /// Scale of the level the point was found on, `scale_step^level`
    pub scale: f32,
    /// Dominant orientation in radians
    pub orientation: f32,
    /// Corner response on its level
    pub response: f32,
    /// Zero-mean, unit-norm intensity samples
    pub descriptor: [f32; DESCRIPTOR_LEN],
}

/// Ratio-test survivor pairing `source` and `target` keypoint indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub source: usize,
    pub target: usize,
    /// Euclidean descriptor distance, never negative
    pub distance: f32,
}

/// A point in the image being warped and where it lands in the reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCorrespondence {
    pub source: [f64; 2],
    pub target: [f64; 2],
}

impl PointCorrespondence {
    pub fn new(source: [f64; 2], target: [f64; 2]) -> Self {
        Self { source, target }
    }
}

/// Which image of the pair is resampled into the other's pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarpSource {
    Rgb,
    Nir,
}

/// Non-singular projective transform from source to target pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Scales the matrix so `h[2][2] == 1` (or to unit norm when that entry
    /// vanishes) and rejects it unless `|det| > min_determinant`.
    pub fn new(matrix: Matrix3<f64>, min_determinant: f64) -> Result<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(FusionError::DegenerateHomography(
                "matrix has non-finite entries".to_string(),
            ));
        }
        let scale = if matrix[(2, 2)].abs() > 1e-12 {
            matrix[(2, 2)]
        } else {
            matrix.norm()
        };
        if scale == 0.0 {
            return Err(FusionError::DegenerateHomography(
                "matrix is all zeros".to_string(),
            ));
        }
        let matrix = matrix / scale;
        let det = matrix.determinant();
        if !det.is_finite() || det.abs() <= min_determinant {
            return Err(FusionError::DegenerateHomography(format!(
                "determinant {:.3e} is within {:.1e} of zero",
                det, min_determinant
            )));
        }
        Ok(Self { matrix })
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn determinant(&self) -> f64 {
        self.matrix.determinant()
    }

    pub fn inverse(&self) -> Result<Homography> {
        let inverse = self.matrix.try_inverse().ok_or_else(|| {
            FusionError::DegenerateHomography("matrix is not invertible".to_string())
        })?;
        Homography::new(inverse, 0.0)
    }

    /// Maps a point; `None` when it lands on the line at infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p[2].abs() < 1e-12 {
            return None;
        }
        Some([p[0] / p[2], p[1] / p[2]])
    }

    pub fn reprojection_error(&self, correspondence: &PointCorrespondence) -> f64 {
        match self.project(correspondence.source[0], correspondence.source[1]) {
            Some([u, v]) => {
                let dx = u - correspondence.target[0];
                let dy = v - correspondence.target[1];
                (dx * dx + dy * dy).sqrt()
            }
            None => f64::INFINITY,
        }
    }
}

/// RGB and NIR rasters sharing one pixel grid.
#[derive(Debug, Clone)]
pub struct RegisteredPair {
    rgb: RasterImage,
    nir: RasterImage,
    homography: Homography,
    warped: WarpSource,
    match_count: usize,
    inlier_count: usize,
}

impl RegisteredPair {
    /// Wraps an already-aligned pair (identity transform).
    pub fn new(rgb: RasterImage, nir: RasterImage) -> Result<Self> {
        validate_pair_shapes(&rgb, &nir)?;
        Ok(Self {
            rgb,
            nir,
            homography: Homography::identity(),
            warped: WarpSource::Rgb,
            match_count: 0,
            inlier_count: 0,
        })
    }

    pub(crate) fn from_registration(
        rgb: RasterImage,
        nir: RasterImage,
        homography: Homography,
        warped: WarpSource,
        match_count: usize,
        inlier_count: usize,
    ) -> Result<Self> {
        validate_pair_shapes(&rgb, &nir)?;
        Ok(Self {
            rgb,
            nir,
            homography,
            warped,
            match_count,
            inlier_count,
        })
    }

    pub fn rgb(&self) -> &RasterImage {
        &self.rgb
    }

    pub fn nir(&self) -> &RasterImage {
        &self.nir
    }

    /// Source-to-target transform that was applied to the warped image.
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    pub fn warped_source(&self) -> WarpSource {
        self.warped
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }

    pub fn inlier_count(&self) -> usize {
        self.inlier_count
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.nir.dimensions()
    }
}

/// Shape contract shared by every consumer of a [`RegisteredPair`].
pub(crate) fn validate_pair_shapes(rgb: &RasterImage, nir: &RasterImage) -> Result<()> {
    rgb.ensure_channels(3, "RGB")?;
    nir.ensure_channels(1, "NIR")?;
    if rgb.dimensions() != nir.dimensions() {
        return Err(FusionError::InvalidImageDimensions(format!(
            "registered images differ in size: RGB {}x{}, NIR {}x{}",
            rgb.width(),
            rgb.height(),
            nir.width(),
            nir.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_homography_normalizes_scale() {
        let h = Homography::new(Matrix3::identity() * 4.0, 1e-6).unwrap();
        assert_abs_diff_eq!(h.matrix()[(2, 2)], 1.0);
        assert_abs_diff_eq!(h.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let singular = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(matches!(
            Homography::new(singular, 1e-6),
            Err(FusionError::DegenerateHomography(_))
        ));
        assert!(Homography::new(Matrix3::zeros(), 1e-6).is_err());
    }

    #[test]
    fn test_project_and_inverse() {
        let h = Homography::new(
            Matrix3::new(1.1, 0.0, 5.0, 0.0, 1.1, 3.0, 0.0, 0.0, 1.0),
            1e-6,
        )
        .unwrap();
        let p = h.project(10.0, 20.0).unwrap();
        assert_abs_diff_eq!(p[0], 16.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[1], 25.0, epsilon = 1e-9);

        let back = h.inverse().unwrap().project(p[0], p[1]).unwrap();
        assert_abs_diff_eq!(back[0], 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(back[1], 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pair_requires_matching_shapes() {
        let rgb = RasterImage::from_u8(4, 4, 3, &[0; 48]).unwrap();
        let nir = RasterImage::from_u8(4, 3, 1, &[0; 12]).unwrap();
        assert!(matches!(
            RegisteredPair::new(rgb.clone(), nir),
            Err(FusionError::InvalidImageDimensions(_))
        ));

        let nir_rgb = RasterImage::from_u8(4, 4, 3, &[0; 48]).unwrap();
        assert!(RegisteredPair::new(rgb, nir_rgb).is_err());
    }
}
