use std::io::{Cursor, Write};

use tiff::encoder::colortype::{Gray8, Gray32Float, RGB8, RGB32Float};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Predictor;
use tracing::debug;

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::RasterImage;
use crate::image_pipeline::tiff::types::{OutputConfig, TiffCompression};
use crate::image_pipeline::tiff::writer::RasterWriter;

pub struct StandardTiffWriter;

fn compression(config: &OutputConfig) -> Compression {
    match config.compression {
        TiffCompression::None => Compression::Uncompressed,
        TiffCompression::Lzw => Compression::Lzw,
        TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
        TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
        TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
    }
}

impl RasterWriter for StandardTiffWriter {
    fn write_raster(
        &self,
        image: &RasterImage,
        output: &mut dyn Write,
        config: &OutputConfig,
    ) -> Result<()> {
        debug!(
            "Encoding TIFF image: {}x{}x{}",
            image.width(),
            image.height(),
            image.channels()
        );
        let (width, height) = (image.width() as u32, image.height() as u32);

        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| FusionError::EncodeError(e.to_string()))?
            .with_compression(compression(config));
        if let Some(predictor_val) = config.predictor {
            let predictor = match predictor_val {
                2 => Predictor::Horizontal,
                _ => Predictor::None,
            };
            encoder = encoder.with_predictor(predictor);
        }

        let written = match (image.channels(), config.float_samples) {
            (1, false) => encoder.write_image::<Gray8>(width, height, &image.to_u8()),
            (3, false) => encoder.write_image::<RGB8>(width, height, &image.to_u8()),
            (channels, true) if channels == 1 || channels == 3 => {
                let scale = 1.0 / image.sample_type().range();
                let samples: Vec<f32> = image.data().iter().map(|&v| v * scale).collect();
                if channels == 1 {
                    encoder.write_image::<Gray32Float>(width, height, &samples)
                } else {
                    encoder.write_image::<RGB32Float>(width, height, &samples)
                }
            }
            (channels, _) => {
                return Err(FusionError::UnsupportedFormat(format!(
                    "cannot encode a {}-channel raster",
                    channels
                )));
            }
        };
        written.map_err(|e| FusionError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;
        debug!("TIFF encoding complete");
        Ok(())
    }
}
