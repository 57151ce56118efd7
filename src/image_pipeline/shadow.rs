//! Shadow detection module
//!
//! Scores every pixel of a registered pair by how dark it is in both bands
//! and how weak its colour is against NIR, then thresholds the score map at
//! a valley of its histogram.

pub mod config;
mod detector;
pub mod types;
pub mod valley;

pub use config::{ShadowConfig, ValleyFallback, ValleySelection};
pub use detector::ShadowDetector;
pub use types::{ShadowMask, ThresholdSource};
pub use valley::{find_valley, initial_bin_count, select_threshold};
