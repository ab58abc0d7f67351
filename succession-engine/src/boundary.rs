//! Segment boundary detection
//!
//! A new segment starts at frame `i + 1` when the distance between frames `i`
//! and `i + 1` exceeds the successor baseline by more than the configured
//! deviation thresholds. Frame 0 always starts the first segment.

use log::debug;
use succession_core::ThresholdConfig;

/// A detected segment and its frame range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Index of the first frame in this segment
    pub start_frame: usize,
    /// Index one past the last frame in this segment (exclusive)
    pub end_frame: usize,
}

impl Segment {
    /// Number of frames in this segment
    pub fn frame_count(&self) -> usize {
        self.end_frame - self.start_frame
    }
}

/// Flags the frame indices at which a new segment begins.
///
/// The result is strictly increasing, starts with 0, and every index is below
/// `distances.len() + 1`. Unset thresholds take no part in the test; with no
/// threshold set only frame 0 is a boundary. Where the baseline is shorter
/// than `distances` its last value is reused.
pub fn detect_boundaries(
    distances: &[f64],
    baseline: &[f64],
    thresholds: &ThresholdConfig,
) -> Vec<usize> {
    let mut boundaries = vec![0];

    let Some(threshold) = thresholds.deviation_thresholds().reduce(f64::max) else {
        debug!("No deviation threshold set, keeping a single segment");
        return boundaries;
    };

    for (i, &distance) in distances.iter().enumerate() {
        let expected = baseline
            .get(i)
            .or_else(|| baseline.last())
            .copied()
            .unwrap_or(0.0);

        if distance - expected > threshold {
            boundaries.push(i + 1);
        }
    }

    debug!(
        "Detected {} boundaries over {} transitions (threshold {:.4})",
        boundaries.len(),
        distances.len(),
        threshold
    );

    boundaries
}

/// Splits `frame_count` frames into segments starting at each boundary
pub fn segments_from_boundaries(boundaries: &[usize], frame_count: usize) -> Vec<Segment> {
    let starts: Vec<usize> = boundaries
        .iter()
        .copied()
        .filter(|&b| b < frame_count)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start_frame)| Segment {
            start_frame,
            end_frame: starts.get(i + 1).copied().unwrap_or(frame_count),
        })
        .collect()
}
