//! Raster data types

use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};

/// Nominal encoding of the samples held by a [`RasterImage`].
///
/// Samples are always stored as `f32`; the sample type records the range
/// they are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    /// 8-bit integer samples, stored in `[0, 255]`
    U8,
    /// Normalized floating samples, stored in `[0, 1]`
    Float,
}

impl SampleType {
    /// Upper end of the nominal sample range.
    pub fn range(self) -> f32 {
        match self {
            SampleType::U8 => 255.0,
            SampleType::Float => 1.0,
        }
    }
}

/// Single-channel `f32` raster. Every numeric operation works on planes.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FusionError::InvalidImageDimensions(format!(
                "plane must be non-empty, got {}x{}",
                width, height
            )));
        }
        if data.len() != width * height {
            return Err(FusionError::InvalidImageDimensions(format!(
                "plane {}x{} needs {} samples, buffer holds {}",
                width,
                height,
                width * height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Bilinear sample with coordinates clamped to the plane.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Plane {
        Plane {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combines two planes of identical shape sample by sample.
    pub fn zip_map(&self, other: &Plane, f: impl Fn(f32, f32) -> f32) -> Result<Plane> {
        self.ensure_same_shape(other)?;
        Ok(Plane {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn ensure_same_shape(&self, other: &Plane) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(FusionError::InvalidImageDimensions(format!(
                "plane shapes differ: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )));
        }
        Ok(())
    }

    /// Returns `(min, max)` over all samples.
    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

/// Interleaved row-major raster of `channels` samples per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: usize,
    height: usize,
    channels: usize,
    sample_type: SampleType,
    data: Vec<f32>,
}

impl RasterImage {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        sample_type: SampleType,
        data: Vec<f32>,
    ) -> Result<Self> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(FusionError::InvalidImageDimensions(format!(
                "raster must be non-empty, got {}x{}x{}",
                width, height, channels
            )));
        }
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(FusionError::InvalidImageDimensions(format!(
                "raster {}x{}x{} needs {} samples, buffer holds {}",
                width,
                height,
                channels,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            sample_type,
            data,
        })
    }

    pub fn from_u8(width: usize, height: usize, channels: usize, bytes: &[u8]) -> Result<Self> {
        let data = bytes.iter().map(|&b| b as f32).collect();
        Self::new(width, height, channels, SampleType::U8, data)
    }

    /// Interleaves equally-shaped planes into one raster.
    pub fn from_planes(planes: &[Plane], sample_type: SampleType) -> Result<Self> {
        let first = planes.first().ok_or_else(|| {
            FusionError::InvalidImageDimensions("at least one plane is required".to_string())
        })?;
        for plane in &planes[1..] {
            first.ensure_same_shape(plane)?;
        }
        let channels = planes.len();
        let mut data = Vec::with_capacity(first.len() * channels);
        for i in 0..first.len() {
            for plane in planes {
                data.push(plane.data()[i]);
            }
        }
        Self::new(first.width(), first.height(), channels, sample_type, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, channel: usize) -> f32 {
        self.data[(y * self.width + x) * self.channels + channel]
    }

    /// Copies one channel out into a plane.
    pub fn channel(&self, channel: usize) -> Result<Plane> {
        if channel >= self.channels {
            return Err(FusionError::InvalidImageDimensions(format!(
                "channel {} requested from a {}-channel raster",
                channel, self.channels
            )));
        }
        let data = self
            .data
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
            .collect();
        Plane::new(self.width, self.height, data)
    }

    pub fn planes(&self) -> Result<Vec<Plane>> {
        (0..self.channels).map(|c| self.channel(c)).collect()
    }

    /// Quantizes to 8 bits: rescales to `[0, 255]`, clamps and rounds.
    pub fn to_u8(&self) -> Vec<u8> {
        let scale = 255.0 / self.sample_type.range();
        self.data
            .iter()
            .map(|&v| (v * scale).clamp(0.0, 255.0).round() as u8)
            .collect()
    }

    pub fn ensure_channels(&self, expected: usize, role: &str) -> Result<()> {
        if self.channels != expected {
            return Err(FusionError::InvalidImageDimensions(format!(
                "{} image must have {} channel(s), got {}",
                role, expected, self.channels
            )));
        }
        Ok(())
    }

    /// Rejects NaN and infinite samples.
    pub fn ensure_finite(&self, role: &str) -> Result<()> {
        if let Some(pos) = self.data.iter().position(|v| !v.is_finite()) {
            let pixel = pos / self.channels;
            return Err(FusionError::InvalidParameter(format!(
                "{} image has a non-finite sample at ({}, {})",
                role,
                pixel % self.width,
                pixel / self.width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_length_must_match_shape() {
        let err = RasterImage::new(4, 4, 3, SampleType::U8, vec![0.0; 47]).unwrap_err();
        assert!(matches!(err, FusionError::InvalidImageDimensions(_)));

        let err = RasterImage::new(0, 4, 1, SampleType::U8, vec![]).unwrap_err();
        assert!(matches!(err, FusionError::InvalidImageDimensions(_)));
    }

    #[test]
    fn test_channel_split_and_interleave() {
        let image = RasterImage::from_u8(2, 1, 3, &[1, 2, 3, 4, 5, 6]).unwrap();
        let planes = image.planes().unwrap();
        assert_eq!(planes[0].data(), &[1.0, 4.0]);
        assert_eq!(planes[2].data(), &[3.0, 6.0]);

        let rebuilt = RasterImage::from_planes(&planes, SampleType::U8).unwrap();
        assert_eq!(rebuilt, image);
        assert!(image.channel(3).is_err());
    }

    #[test]
    fn test_to_u8_scales_float_and_clamps() {
        let image =
            RasterImage::new(4, 1, 1, SampleType::Float, vec![-0.2, 0.0, 0.5, 1.7]).unwrap();
        assert_eq!(image.to_u8(), vec![0, 0, 128, 255]);
    }

    #[test]
    fn test_bilinear_sampling_interpolates_and_clamps() {
        let plane = Plane::new(2, 2, vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        assert_eq!(plane.sample_bilinear(0.5, 0.5), 15.0);
        assert_eq!(plane.sample_bilinear(-3.0, 0.0), 0.0);
        assert_eq!(plane.sample_bilinear(9.0, 9.0), 30.0);
    }

    #[test]
    fn test_non_finite_samples_are_rejected() {
        let image = RasterImage::new(2, 1, 1, SampleType::Float, vec![0.1, f32::NAN]).unwrap();
        assert!(matches!(
            image.ensure_finite("nir"),
            Err(FusionError::InvalidParameter(_))
        ));
    }
}
