use crate::image_pipeline::raster::RasterImage;

/// Where a shadow threshold came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdSource {
    Valley {
        bin: usize,
        bin_count: usize,
        /// Histograms built before the valley turned up
        iterations: usize,
    },
    Otsu,
    Median,
}

/// Binary shadow map: one channel, `1.0` for shadow pixels, `0.0` elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMask {
    mask: RasterImage,
    threshold: f32,
    source: ThresholdSource,
}

impl ShadowMask {
    pub(crate) fn new(mask: RasterImage, threshold: f32, source: ThresholdSource) -> Self {
        Self {
            mask,
            threshold,
            source,
        }
    }

    pub fn mask(&self) -> &RasterImage {
        &self.mask
    }

    pub fn into_mask(self) -> RasterImage {
        self.mask
    }

    /// Scores at or below this value are shadow.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn source(&self) -> ThresholdSource {
        self.source
    }

    pub fn is_shadow(&self, x: usize, y: usize) -> bool {
        self.mask.get(x, y, 0) > 0.5
    }

    /// Fraction of pixels flagged as shadow.
    pub fn coverage(&self) -> f32 {
        let data = self.mask.data();
        data.iter().filter(|&&v| v > 0.5).count() as f32 / data.len() as f32
    }
}
