//! Successor distance baseline
//!
//! The baseline is the distance expected between temporally adjacent frames
//! when no scene change happens. Observed distances are judged relative to it
//! so that a jump is measured against local dynamics instead of one global
//! threshold.

use crate::distance::consecutive_distances;
use crate::Result;
use succession_core::config::DEFAULT_BASELINE_WINDOW;
use succession_core::EmbeddingSequence;

/// Computes the successor baseline of an embedding trajectory.
///
/// Implementations must be deterministic: the same embeddings always give the
/// same baseline.
pub trait BaselineEstimator: Send + Sync {
    /// Baseline value per consecutive pair of the trajectory (`n − 1` values)
    fn estimate(&self, embeddings: &EmbeddingSequence) -> Result<Vec<f64>>;
}

/// Centered rolling median of the trajectory's consecutive distances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingMedianBaseline {
    window: usize,
}

impl RollingMedianBaseline {
    /// Creates an estimator; a window of 0 is treated as 1
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for RollingMedianBaseline {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW)
    }
}

impl BaselineEstimator for RollingMedianBaseline {
    fn estimate(&self, embeddings: &EmbeddingSequence) -> Result<Vec<f64>> {
        let distances = consecutive_distances(embeddings)?;
        Ok(rolling_median(&distances, self.window))
    }
}

/// Median of the `window` values centered on each position.
///
/// Windows are truncated at both ends of the sequence. The median of an even
/// number of values is the mean of the two middle ones.
pub fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let before = window / 2;
    let after = window - before;

    let mut scratch = Vec::with_capacity(window);
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after).min(values.len());
            scratch.clear();
            scratch.extend_from_slice(&values[start..end]);
            median(&mut scratch)
        })
        .collect()
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
