use std::io::Write;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raster::RasterImage;
use crate::image_pipeline::tiff::types::OutputConfig;

pub trait RasterWriter {
    fn write_raster(
        &self,
        image: &RasterImage,
        output: &mut dyn Write,
        config: &OutputConfig,
    ) -> Result<()>;
}
