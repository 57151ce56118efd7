use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid image dimensions: {0}")]
    InvalidImageDimensions(String),

    #[error("Degenerate channel: every sample equals {0}")]
    DegenerateChannel(f32),

    #[error("Insufficient matches: found {found}, need at least {required}")]
    InsufficientMatches { found: usize, required: usize },

    #[error("Degenerate homography: {0}")]
    DegenerateHomography(String),

    #[error("No histogram valley found after {iterations} refinement iterations")]
    ShadowValleyNotFound { iterations: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode raster: {0}")]
    DecodeError(String),

    #[error("Failed to encode raster: {0}")]
    EncodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FusionError>;
