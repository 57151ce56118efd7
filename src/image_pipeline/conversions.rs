//! Pipeline conversions module
//!
//! Orchestrates one capture end to end: decode the RGB and NIR frames,
//! register them, run the stages selected by the operation mode and encode
//! the results.

pub mod config;
mod nir_fusion;


pub use config::{OperationMode, PipelineConfig, PipelineConfigBuilder};
pub use nir_fusion::{
    FUSED_FILE, NIR_REGISTERED_FILE, NirFusionPipeline, PipelineOutput, RGB_REGISTERED_FILE,
    SHADOW_MASK_FILE,
};
