//! Perspective resampling into a target pixel grid.

use rayon::prelude::*;

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::RasterImage;
use crate::image_pipeline::registration::types::Homography;

/// Samples closer than this to the source border are still treated as inside.
const EDGE_TOLERANCE: f64 = 1e-3;

/// Resamples `image` into a `width × height` grid so that output pixel `p`
/// takes the value at `H⁻¹·p` in the source.
///
/// Uses bilinear interpolation. Pixels whose preimage falls outside the
/// source, or on the line at infinity, are set to `fill`.
pub fn warp_perspective(
    image: &RasterImage,
    homography: &Homography,
    width: usize,
    height: usize,
    fill: f32,
) -> Result<RasterImage> {
    if width == 0 || height == 0 {
        return Err(FusionError::InvalidImageDimensions(format!(
            "cannot warp into a {}x{} grid",
            width, height
        )));
    }
    let inverse = homography.inverse()?;
    let channels = image.channels();
    let (src_w, src_h) = (image.width() as f64, image.height() as f64);
    let src = image.data();
    let stride = image.width() * channels;

    let mut out = vec![fill; width * height * channels];
    out.par_chunks_mut(width * channels)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let Some([sx, sy]) = inverse.project(x as f64, y as f64) else {
                    continue;
                };
                if sx < -EDGE_TOLERANCE
                    || sy < -EDGE_TOLERANCE
                    || sx > src_w - 1.0 + EDGE_TOLERANCE
                    || sy > src_h - 1.0 + EDGE_TOLERANCE
                {
                    continue;
                }
                let sx = sx.clamp(0.0, src_w - 1.0);
                let sy = sy.clamp(0.0, src_h - 1.0);
                let x0 = sx.floor() as usize;
                let y0 = sy.floor() as usize;
                let x1 = (x0 + 1).min(image.width() - 1);
                let y1 = (y0 + 1).min(image.height() - 1);
                let fx = (sx - x0 as f64) as f32;
                let fy = (sy - y0 as f64) as f32;

                for c in 0..channels {
                    let at = |px: usize, py: usize| src[py * stride + px * channels + c];
                    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
                    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
                    row[x * channels + c] = top * (1.0 - fy) + bottom * fy;
                }
            }
        });

    RasterImage::new(width, height, channels, image.sample_type(), out)
}
