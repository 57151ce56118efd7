use tracing::{debug, info_span, instrument};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::merging::types::{FusedImage, FusionLayers, MergeConfig};
use crate::image_pipeline::raster::{
    LumaChroma, RasterImage, SampleType, bilateral_filter, from_luma_chroma, mean, to_luma_chroma,
};
use crate::image_pipeline::registration::RegisteredPair;

/// Transplants NIR high-frequency detail onto the RGB luminance.
///
/// Both luma and NIR are split into a bilateral base layer; the NIR residual
/// replaces the luma residual, chroma is carried over untouched.
pub struct DetailFusionMerger {
    config: MergeConfig,
}

impl DetailFusionMerger {
    pub fn new(config: MergeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Computes every intermediate layer without building the output image.
    pub fn decompose(&self, pair: &RegisteredPair) -> Result<FusionLayers> {
        let (rgb, nir) = (pair.rgb(), pair.nir());
        if rgb.sample_type() != nir.sample_type() {
            return Err(FusionError::InvalidParameter(format!(
                "cannot fuse {:?} RGB with {:?} NIR",
                rgb.sample_type(),
                nir.sample_type()
            )));
        }
        rgb.ensure_finite("RGB")?;
        nir.ensure_finite("NIR")?;

        let to_8bit = 255.0 / rgb.sample_type().range();
        let lc = to_luma_chroma(rgb)?;
        let y = lc.y.map(|v| v * to_8bit);
        let cb = lc.cb.map(|v| v * to_8bit);
        let cr = lc.cr.map(|v| v * to_8bit);
        let nir = nir.channel(0)?.map(|v| v * to_8bit);

        let shift = mean(&y) - mean(&nir);
        let nir = nir.map(|v| v + shift);

        let (y_base, nir_base) = {
            let _span = info_span!("bilateral_base").entered();
            let params = &self.config.bilateral;
            rayon::join(|| bilateral_filter(&y, params), || bilateral_filter(&nir, params))
        };
        let (y_base, nir_base) = (y_base?, nir_base?);

        let nir_detail = nir.zip_map(&nir_base, |n, b| n - b)?;
        let y_out = y_base.zip_map(&nir_detail, |b, d| b + d)?;
        debug!(shift, "Detail layers computed");

        Ok(FusionLayers {
            shift,
            y,
            cb,
            cr,
            nir,
            y_base,
            nir_base,
            nir_detail,
            y_out,
        })
    }

    /// Fuses a registered pair.
    ///
    /// The recombined RGB is clipped to the nominal range of the input
    /// sample type; 8-bit outputs are also rounded to whole levels.
    #[instrument(skip_all, fields(dimensions = ?pair.dimensions()))]
    pub fn merge(&self, pair: &RegisteredPair) -> Result<FusedImage> {
        let layers = self.decompose(pair)?;
        let sample_type = pair.rgb().sample_type();
        let from_8bit = sample_type.range() / 255.0;

        let recombined = from_luma_chroma(&LumaChroma {
            y: layers.y_out.map(|v| v * from_8bit),
            cb: layers.cb.map(|v| v * from_8bit),
            cr: layers.cr.map(|v| v * from_8bit),
            sample_type,
        })?;

        let range = sample_type.range();
        let data = recombined
            .data()
            .iter()
            .map(|&v| {
                let v = v.clamp(0.0, range);
                match sample_type {
                    SampleType::U8 => v.round(),
                    SampleType::Float => v,
                }
            })
            .collect();
        let (width, height) = recombined.dimensions();
        Ok(FusedImage::new(RasterImage::new(
            width,
            height,
            3,
            sample_type,
            data,
        )?))
    }
}
