//! Adaptive histogram thresholding.
//!
//! The score histogram is searched for a valley; without one, the histogram
//! is rebuilt with one more bin and searched again, up to a fixed number of
//! attempts, after which a fallback threshold is used.

use tracing::{debug, warn};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::raster::{histogram, median, otsu_threshold};
use crate::image_pipeline::shadow::config::{ShadowConfig, ValleyFallback, ValleySelection};
use crate::image_pipeline::shadow::types::ThresholdSource;

const OTSU_BINS: usize = 256;

/// `⌈ν · ⌈log2(n) + 1⌉⌉` bins for `n` samples.
pub fn initial_bin_count(samples: usize, nabla: f32) -> usize {
    let sturges = ((samples.max(1) as f64).log2() + 1.0).ceil();
    ((nabla as f64 * sturges).ceil() as usize).max(1)
}

/// Index of a valley bin: strictly lower than its two neighbours on each
/// side, which must themselves fall strictly towards it, and lower than the
/// running maximum. Bins `3..=n-3` are scanned.
pub fn find_valley(counts: &[usize], selection: ValleySelection) -> Option<usize> {
    let n = counts.len();
    if n < 6 {
        return None;
    }
    let mut ceiling = counts.iter().copied().max().unwrap_or(0);
    let mut valley = None;
    for x in 3..=n - 3 {
        let c = counts[x];
        let falling = c < counts[x - 1] && counts[x - 1] < counts[x - 2];
        let rising = c < counts[x + 1] && counts[x + 1] < counts[x + 2];
        if c < ceiling && falling && rising {
            valley = Some(x);
            match selection {
                ValleySelection::First => break,
                ValleySelection::Deepest => ceiling = c,
            }
        }
    }
    valley
}

/// Threshold separating shadow scores from the rest.
///
/// Returns the centre of the valley bin when one is found within
/// `max_valley_iterations` histograms, the configured fallback otherwise.
pub fn select_threshold(scores: &[f32], config: &ShadowConfig) -> Result<(f32, ThresholdSource)> {
    let initial = initial_bin_count(scores.len(), config.nabla);

    for iteration in 0..config.max_valley_iterations {
        let bin_count = initial + iteration;
        let hist = histogram(scores, bin_count)?;
        if let Some(bin) = find_valley(&hist.counts, config.valley_selection) {
            let threshold = (hist.edges[0] + hist.bin_width() * (bin as f64 + 0.5)) as f32;
            debug!(bin, bin_count, iterations = iteration + 1, threshold, "Histogram valley found");
            return Ok((
                threshold,
                ThresholdSource::Valley {
                    bin,
                    bin_count,
                    iterations: iteration + 1,
                },
            ));
        }
    }

    warn!(
        iterations = config.max_valley_iterations,
        fallback = ?config.fallback,
        "No histogram valley found"
    );
    let median_threshold = || {
        median(scores)
            .map(|m| (m, ThresholdSource::Median))
            .ok_or_else(|| FusionError::InvalidParameter("empty shadow score map".to_string()))
    };
    match config.fallback {
        ValleyFallback::Otsu => match otsu_threshold(scores, OTSU_BINS)? {
            Some(t) => Ok((t, ThresholdSource::Otsu)),
            None => median_threshold(),
        },
        ValleyFallback::Median => median_threshold(),
        ValleyFallback::Fail => Err(FusionError::ShadowValleyNotFound {
            iterations: config.max_valley_iterations,
        }),
    }
}
