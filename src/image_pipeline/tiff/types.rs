//! TIFF output configuration types

use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

/// How pipeline outputs are encoded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub compression: TiffCompression,
    /// Predictor for compressed output (2 = horizontal differencing)
    pub predictor: Option<u16>,
    /// Write 32-bit float samples in `[0, 1]` instead of 8-bit samples
    pub float_samples: bool,
    /// Stretch the 0/1 shadow mask to 0/255 so it is visible in viewers
    pub scale_mask: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: TiffCompression::None,
            predictor: None,
            float_samples: false,
            scale_mask: false,
        }
    }
}

impl OutputConfig {
    pub fn builder() -> OutputConfigBuilder {
        OutputConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        match self.predictor {
            None | Some(1) | Some(2) => Ok(()),
            Some(other) => Err(FusionError::ConfigError(format!(
                "unsupported TIFF predictor {}",
                other
            ))),
        }
    }
}

/// Builder for OutputConfig
#[derive(Default)]
pub struct OutputConfigBuilder {
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
    float_samples: Option<bool>,
    scale_mask: Option<bool>,
}

impl OutputConfigBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn float_samples(mut self, enable: bool) -> Self {
        self.float_samples = Some(enable);
        self
    }

    pub fn scale_mask(mut self, enable: bool) -> Self {
        self.scale_mask = Some(enable);
        self
    }

    pub fn build(self) -> OutputConfig {
        let default = OutputConfig::default();
        OutputConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
            float_samples: self.float_samples.unwrap_or(default.float_samples),
            scale_mask: self.scale_mask.unwrap_or(default.scale_mask),
        }
    }
}
