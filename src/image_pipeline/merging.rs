//! Detail-transfer fusion module
//!
//! Builds an RGB image whose fine texture comes from the NIR frame: luma and
//! NIR are split into bilateral base and detail layers in YCbCr, and the NIR
//! detail is added to the luma base.

mod merger;
pub mod types;

pub use merger::DetailFusionMerger;
pub use types::{FusedImage, FusionLayers, MergeConfig};
