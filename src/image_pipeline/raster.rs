//! Raster operations module
//!
//! Owns the in-memory raster model and the stateless numeric transforms the
//! registration, merging and shadow stages are built from: color-space
//! conversion, min-max normalization, gamma mapping, smoothing and histograms.

pub mod color;
pub mod filter;
pub mod histogram;
pub mod levels;
pub mod types;

pub use color::{LumaChroma, from_luma_chroma, luma, to_luma_chroma};
pub use filter::{BilateralParams, bilateral_filter, gaussian_blur};
pub use histogram::{Histogram, histogram, otsu_threshold};
pub use levels::{equalize_histogram, gamma_correct, mean, median, normalize};
pub use types::{Plane, RasterImage, SampleType};
