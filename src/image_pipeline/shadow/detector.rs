use tracing::{info, info_span, instrument};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::{Plane, RasterImage, SampleType, gamma_correct, normalize};
use crate::image_pipeline::registration::RegisteredPair;
use crate::image_pipeline::shadow::config::ShadowConfig;
use crate::image_pipeline::shadow::types::ShadowMask;
use crate::image_pipeline::shadow::valley::select_threshold;

/// Flags pixels that are dark in both bands and whose colour is weak
/// relative to NIR.
pub struct ShadowDetector {
    config: ShadowConfig,
}

impl ShadowDetector {
    pub fn new(config: ShadowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Darkness sigmoid `1 / (1 + exp(-α((1 - x) - β)))`.
    fn darkness(&self, x: f32) -> f32 {
        1.0 / (1.0 + (-self.config.alpha * ((1.0 - x) - self.config.beta)).exp())
    }

    /// Per-pixel shadow score `U = (1 - D)(1 - T)`; low scores are shadow.
    ///
    /// `D` is the product of the darkness of the visible brightness and of
    /// the NIR, `T` the colour-to-NIR ratio bounded by `tao` and scaled to
    /// `[0, 1]`. Every input channel is min-max normalized first, so a
    /// constant channel is rejected as degenerate.
    pub fn shadow_score(&self, pair: &RegisteredPair) -> Result<Plane> {
        let (rgb, nir) = (pair.rgb(), pair.nir());
        rgb.ensure_finite("RGB")?;
        nir.ensure_finite("NIR")?;

        let r = normalize(&rgb.channel(0)?)?;
        let g = normalize(&rgb.channel(1)?)?;
        let b = normalize(&rgb.channel(2)?)?;
        let nir = gamma_correct(&normalize(&nir.channel(0)?)?, self.config.gamma)?;

        let brightness = Plane::from_fn(r.width(), r.height(), |x, y| {
            (r.get(x, y) + g.get(x, y) + b.get(x, y)) / 3.0
        });
        let brightness = gamma_correct(&brightness, self.config.gamma)?;

        let (tao, epsilon) = (self.config.tao, self.config.epsilon);
        Ok(Plane::from_fn(r.width(), r.height(), |x, y| {
            let n = nir.get(x, y);
            let d = self.darkness(brightness.get(x, y)) * self.darkness(n);
            let ratio = r.get(x, y).max(g.get(x, y)).max(b.get(x, y)) / (n + epsilon);
            let t = ratio.min(tao) / tao;
            (1.0 - d) * (1.0 - t)
        }))
    }

    #[instrument(skip_all, fields(dimensions = ?pair.dimensions()))]
    pub fn detect(&self, pair: &RegisteredPair) -> Result<ShadowMask> {
        let scores = {
            let _span = info_span!("shadow_score").entered();
            self.shadow_score(pair)?
        };
        let (threshold, source) = {
            let _span = info_span!("valley_search").entered();
            select_threshold(scores.data(), &self.config)?
        };

        let mask: Vec<f32> = scores
            .data()
            .iter()
            .map(|&u| if u <= threshold { 1.0 } else { 0.0 })
            .collect();
        let mask = ShadowMask::new(
            RasterImage::new(scores.width(), scores.height(), 1, SampleType::U8, mask)?,
            threshold,
            source,
        );
        info!(
            threshold,
            source = ?mask.source(),
            coverage = mask.coverage(),
            "Shadow mask computed"
        );
        Ok(mask)
    }
}
