//! Synchronized dual-camera capture
//!
//! The NIR host asks the RGB host to capture at a shared future instant,
//! captures its own frame at that instant and receives the remote frame
//! over TCP. The positioning tool that runs before a capture reports which
//! post-processing stages the operator requested.

mod client;
mod positioning;
pub mod protocol;
mod schedule;
mod server;
mod source;
pub mod types;

pub use client::{CaptureClient, CapturedPair};
pub use positioning::request_operation;
pub use schedule::sleep_until;
pub use server::CaptureServer;
pub use source::{FileFrameSource, FrameSource};
pub use types::CaptureConfig;
