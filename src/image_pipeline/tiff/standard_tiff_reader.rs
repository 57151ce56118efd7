use std::io::Cursor;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::{RasterImage, SampleType};
use crate::image_pipeline::tiff::reader::RasterReader;

/// Decodes 8-bit, 16-bit and float grayscale or RGB(A) TIFFs.
///
/// 8-bit input keeps the `U8` sample type; wider input is scaled to `Float`.
/// An alpha channel is dropped.
pub struct StandardTiffReader;

impl RasterReader for StandardTiffReader {
    fn read_raster(&self, data: &[u8]) -> Result<RasterImage> {
        let mut decoder =
            Decoder::new(Cursor::new(data)).map_err(|e| FusionError::DecodeError(e.to_string()))?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| FusionError::DecodeError(e.to_string()))?;
        let color = decoder
            .colortype()
            .map_err(|e| FusionError::DecodeError(e.to_string()))?;
        let (stored, kept) = match color {
            ColorType::Gray(_) => (1, 1),
            ColorType::RGB(_) => (3, 3),
            ColorType::RGBA(_) => (4, 3),
            other => {
                return Err(FusionError::UnsupportedFormat(format!(
                    "color type {:?}",
                    other
                )));
            }
        };
        debug!("Decoding TIFF image: {}x{} {:?}", width, height, color);

        let image = decoder
            .read_image()
            .map_err(|e| FusionError::DecodeError(e.to_string()))?;
        let (samples, sample_type): (Vec<f32>, SampleType) = match image {
            DecodingResult::U8(v) => (v.into_iter().map(f32::from).collect(), SampleType::U8),
            DecodingResult::U16(v) => (
                v.into_iter().map(|s| s as f32 / u16::MAX as f32).collect(),
                SampleType::Float,
            ),
            DecodingResult::F32(v) => (v, SampleType::Float),
            DecodingResult::F64(v) => {
                (v.into_iter().map(|s| s as f32).collect(), SampleType::Float)
            }
            _ => {
                return Err(FusionError::UnsupportedFormat(format!(
                    "sample format of {:?}",
                    color
                )));
            }
        };

        let samples = if stored == kept {
            samples
        } else {
            samples
                .chunks_exact(stored)
                .flat_map(|px| px[..kept].iter().copied())
                .collect()
        };
        RasterImage::new(width as usize, height as usize, kept, sample_type, samples)
    }
}
