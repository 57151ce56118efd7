use std::path::PathBuf;

use tracing::debug;

use crate::image_pipeline::common::error::{FusionError, Result};

/// A camera, or anything standing in for one.
///
/// Callers wait for the scheduled instant themselves; `capture` grabs a
/// frame now and returns its encoded bytes.
pub trait FrameSource {
    fn capture(&self) -> Result<Vec<u8>>;
}

/// Serves the current contents of a file as each captured frame.
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for FileFrameSource {
    fn capture(&self) -> Result<Vec<u8>> {
        let frame = std::fs::read(&self.path)
            .map_err(|e| FusionError::CaptureError(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), bytes = frame.len(), "Frame read");
        Ok(frame)
    }
}
