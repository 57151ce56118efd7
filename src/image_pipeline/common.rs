//! Common utilities module
//!
//! This module contains the error taxonomy and step timing shared by every
//! stage of the fusion pipeline.

pub mod error;
pub mod timing;

pub use error::{FusionError, Result};
pub use timing::{PipelineTimings, StepTiming, Timer};
