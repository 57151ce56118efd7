use std::ffi::OsStr;
use std::process::Command;

use tracing::info;

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::conversions::OperationMode;

/// Runs the pan/tilt positioning tool to completion and parses the
/// operation the operator selected from its standard output.
pub fn request_operation<I, A>(program: impl AsRef<OsStr>, args: I) -> Result<OperationMode>
where
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let program = program.as_ref();
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| FusionError::CaptureError(format!("{}: {}", program.to_string_lossy(), e)))?;

    if !output.status.success() {
        return Err(FusionError::CaptureError(format!(
            "{} exited with {}",
            program.to_string_lossy(),
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mode: OperationMode = stdout.trim().parse()?;
    info!(%mode, "Operation requested");
    Ok(mode)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_token_on_stdout_selects_mode() {
        assert_eq!(
            request_operation("echo", ["OP_SKIN_SMOOTHING"]).unwrap(),
            OperationMode::SkinSmoothing
        );
        assert_eq!(
            request_operation("sh", ["-c", "printf OP_SHADOW_DETECTION"]).unwrap(),
            OperationMode::ShadowDetection
        );
    }

    #[test]
    fn test_failing_tool() {
        assert!(matches!(
            request_operation("false", [] as [&str; 0]),
            Err(FusionError::CaptureError(_))
        ));
        assert!(matches!(
            request_operation("/nonexistent/pan-tilt", [] as [&str; 0]),
            Err(FusionError::CaptureError(_))
        ));
    }

    #[test]
    fn test_unknown_token() {
        assert!(matches!(
            request_operation("echo", ["OP_PANORAMA"]),
            Err(FusionError::ConfigError(_))
        ));
    }
}
