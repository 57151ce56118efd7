//! Capture configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};

pub const DEFAULT_PORT: u16 = 1313;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How far in the future the shared capture instant is scheduled
    pub lead_time_ms: u64,
    /// Largest frame either side accepts
    pub max_frame_bytes: u64,
    /// Socket read/write timeout, on top of the lead time for the client
    pub io_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            lead_time_ms: 1000,
            max_frame_bytes: 256 * 1024 * 1024,
            io_timeout_ms: 30_000,
        }
    }
}

impl CaptureConfig {
    pub fn lead_time(&self) -> Duration {
        Duration::from_millis(self.lead_time_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_frame_bytes == 0 {
            return Err(FusionError::ConfigError(
                "max_frame_bytes must be positive".to_string(),
            ));
        }
        if self.io_timeout_ms == 0 {
            return Err(FusionError::ConfigError(
                "io_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
