//! Image processing pipeline module
//!
//! RGB/NIR fusion for a dual-camera rig, split into stage modules: raster
//! primitives, registration, detail fusion, shadow detection, TIFF I/O,
//! the end-to-end pipeline and the synchronized capture collaborators.

pub mod capture;
pub mod common;
pub mod conversions;
pub mod merging;
pub mod raster;
pub mod registration;
pub mod shadow;
pub mod tiff;

pub use common::{FusionError, PipelineTimings, Result};

pub use raster::{Plane, RasterImage, SampleType};

pub use registration::{FeatureRegistrar, Homography, RegisteredPair, RegistrationConfig};

pub use merging::{DetailFusionMerger, FusedImage, MergeConfig};

pub use shadow::{ShadowConfig, ShadowDetector, ShadowMask};

pub use tiff::{
    OutputConfig, RasterReader, RasterWriter, StandardTiffReader, StandardTiffWriter,
    TiffCompression,
};

pub use conversions::{NirFusionPipeline, OperationMode, PipelineConfig, PipelineOutput};

pub use capture::{CaptureClient, CaptureConfig, CaptureServer, FileFrameSource, FrameSource};
