//! TIFF raster I/O module
//!
//! Decodes capture frames into [`RasterImage`](crate::image_pipeline::raster::RasterImage)
//! and encodes pipeline outputs, with configurable compression.

mod reader;
mod standard_tiff_reader;
mod standard_tiff_writer;
pub mod types;
mod writer;

pub use reader::RasterReader;
pub use standard_tiff_reader::StandardTiffReader;
pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{OutputConfig, OutputConfigBuilder, TiffCompression};
pub use writer::RasterWriter;
