//! Detail-fusion configuration and result types

use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::{BilateralParams, Plane, RasterImage};

/// Settings for luminance detail transfer.
///
/// The bilateral parameters are applied to planes on the 8-bit scale
/// (`0..=255`) whatever the sample type of the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MergeConfig {
    pub bilateral: BilateralParams,
}

impl MergeConfig {
    pub fn validate(&self) -> Result<()> {
        self.bilateral.validate()
    }
}

/// RGB colour with NIR texture. Same size and sample type as the registered
/// RGB frame, always 3 channels, samples clipped to the nominal range.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedImage {
    image: RasterImage,
}

impl FusedImage {
    pub(crate) fn new(image: RasterImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RasterImage {
        &self.image
    }

    pub fn into_image(self) -> RasterImage {
        self.image
    }
}

/// Intermediate planes of one fusion, all on the 8-bit scale.
#[derive(Debug, Clone)]
pub struct FusionLayers {
    /// `mean(Y) - mean(NIR)`
    pub shift: f32,
    pub y: Plane,
    pub cb: Plane,
    pub cr: Plane,
    /// NIR after the global brightness shift
    pub nir: Plane,
    pub y_base: Plane,
    pub nir_base: Plane,
    /// `nir - nir_base`
    pub nir_detail: Plane,
    /// `y_base + nir_detail`, before clipping
    pub y_out: Plane,
}
