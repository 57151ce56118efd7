//! Capture wire format
//!
//! Request: the capture instant as a big-endian `u64` count of microseconds
//! since the Unix epoch. Response: a big-endian `u64` byte length followed by
//! the encoded frame.

use std::io::{Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::image_pipeline::common::error::{FusionError, Result};

pub fn to_micros(instant: SystemTime) -> Result<u64> {
    let since_epoch = instant
        .duration_since(UNIX_EPOCH)
        .map_err(|e| FusionError::CaptureError(format!("capture instant before epoch: {}", e)))?;
    u64::try_from(since_epoch.as_micros())
        .map_err(|_| FusionError::CaptureError("capture instant out of range".to_string()))
}

pub fn from_micros(micros: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_micros(micros)
}

pub fn write_request(output: &mut impl Write, capture_at: SystemTime) -> Result<()> {
    output.write_all(&to_micros(capture_at)?.to_be_bytes())?;
    output.flush()?;
    Ok(())
}

pub fn read_request(input: &mut impl Read) -> Result<SystemTime> {
    let mut word = [0u8; 8];
    input.read_exact(&mut word)?;
    Ok(from_micros(u64::from_be_bytes(word)))
}

pub fn write_frame(output: &mut impl Write, frame: &[u8]) -> Result<()> {
    output.write_all(&(frame.len() as u64).to_be_bytes())?;
    output.write_all(frame)?;
    output.flush()?;
    Ok(())
}

/// Reads one length-prefixed frame, refusing lengths above `max_bytes`
/// before allocating.
pub fn read_frame(input: &mut impl Read, max_bytes: u64) -> Result<Vec<u8>> {
    let mut word = [0u8; 8];
    input.read_exact(&mut word)?;
    let len = u64::from_be_bytes(word);
    if len > max_bytes {
        return Err(FusionError::CaptureError(format!(
            "frame of {} bytes exceeds the {} byte limit",
            len, max_bytes
        )));
    }
    let len = usize::try_from(len)
        .map_err(|_| FusionError::CaptureError(format!("frame of {} bytes", len)))?;
    let mut frame = vec![0u8; len];
    input.read_exact(&mut frame)?;
    Ok(frame)
}
