//! RGB ↔ luma/chroma conversion (full-range BT.601 YCbCr).

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::types::{Plane, RasterImage, SampleType};

const KR: f32 = 0.299;
const KG: f32 = 0.587;
const KB: f32 = 0.114;

/// Luma and chroma planes of an RGB raster, in the raster's sample range.
///
/// Chroma planes are offset by half the sample range (128 for `U8`,
/// 0.5 for `Float`), so neutral grey has `cb == cr == offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaChroma {
    pub y: Plane,
    pub cb: Plane,
    pub cr: Plane,
    pub sample_type: SampleType,
}

fn chroma_offset(sample_type: SampleType) -> f32 {
    sample_type.range() / 2.0
}

pub fn to_luma_chroma(rgb: &RasterImage) -> Result<LumaChroma> {
    rgb.ensure_channels(3, "RGB")?;
    let offset = chroma_offset(rgb.sample_type());
    let pixels = rgb.width() * rgb.height();
    let mut y = Vec::with_capacity(pixels);
    let mut cb = Vec::with_capacity(pixels);
    let mut cr = Vec::with_capacity(pixels);

    for px in rgb.data().chunks_exact(3) {
        let (r, g, b) = (px[0], px[1], px[2]);
        let luma = KR * r + KG * g + KB * b;
        y.push(luma);
        cb.push((b - luma) / (2.0 * (1.0 - KB)) + offset);
        cr.push((r - luma) / (2.0 * (1.0 - KR)) + offset);
    }

    Ok(LumaChroma {
        y: Plane::new(rgb.width(), rgb.height(), y)?,
        cb: Plane::new(rgb.width(), rgb.height(), cb)?,
        cr: Plane::new(rgb.width(), rgb.height(), cr)?,
        sample_type: rgb.sample_type(),
    })
}

/// Exact inverse of [`to_luma_chroma`]. No clipping is applied; values that
/// leave the nominal range are the caller's to clip.
pub fn from_luma_chroma(lc: &LumaChroma) -> Result<RasterImage> {
    lc.y.ensure_same_shape(&lc.cb)?;
    lc.y.ensure_same_shape(&lc.cr)?;
    let offset = chroma_offset(lc.sample_type);
    let mut data = Vec::with_capacity(lc.y.len() * 3);

    for ((&luma, &cb), &cr) in lc.y.data().iter().zip(lc.cb.data()).zip(lc.cr.data()) {
        let r = luma + 2.0 * (1.0 - KR) * (cr - offset);
        let b = luma + 2.0 * (1.0 - KB) * (cb - offset);
        let g = (luma - KR * r - KB * b) / KG;
        data.extend_from_slice(&[r, g, b]);
    }

    RasterImage::new(lc.y.width(), lc.y.height(), 3, lc.sample_type, data)
}

/// Single-channel intensity of a raster: the luma of RGB input, the plane
/// itself for single-channel input.
pub fn luma(image: &RasterImage) -> Result<Plane> {
    match image.channels() {
        1 => image.channel(0),
        _ => to_luma_chroma(image).map(|lc| lc.y),
    }
}
