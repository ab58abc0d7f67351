//! Segment duration capping
//!
//! Inserts intermediate boundaries so that a segment longer than the maximum
//! duration is split at the latest frame still within the cap.

use log::{debug, warn};

/// Caps segment durations by inserting synthetic boundaries.
///
/// With `max_duration` unset the input is returned unchanged. Otherwise each
/// boundary `b` whose timestamp lies more than `max_duration` seconds after the
/// last accepted boundary gets one synthetic boundary inserted before it, found
/// by [`find_acceptable_frame`] in the window between the previous boundary and
/// `b`. The output is strictly increasing and holds every input boundary.
/// `video` names the video in log output.
pub fn cap_segment_durations(
    video: &str,
    boundaries: &[usize],
    timestamps: &[f64],
    max_duration: Option<f64>,
) -> Vec<usize> {
    let Some(max_duration) = max_duration else {
        return boundaries.to_vec();
    };
    let Some(&first) = boundaries.first() else {
        return Vec::new();
    };

    let mut capped = vec![first];
    let mut last_timestamp = timestamp_or_warn(video, timestamps, first).unwrap_or(0.0);

    for pair in boundaries.windows(2) {
        let (previous, current) = (pair[0], pair[1]);

        let Some(current_timestamp) = timestamp_or_warn(video, timestamps, current) else {
            push_unique(&mut capped, current);
            continue;
        };

        if current_timestamp - last_timestamp > max_duration {
            let acceptable = find_acceptable_frame(
                video,
                previous,
                current,
                timestamps,
                last_timestamp,
                max_duration,
            );
            if push_unique(&mut capped, acceptable) {
                debug!(
                    "Video {}: inserted boundary {} to cap segment before {} at {:.2}s",
                    video, acceptable, current, max_duration
                );
                last_timestamp = timestamps[acceptable];
            }
        }

        if push_unique(&mut capped, current) {
            last_timestamp = current_timestamp;
        }
    }

    capped
}

/// Finds the latest frame in `[window_start, window_end)` whose timestamp is at
/// most `max_duration` seconds after `last_timestamp`.
///
/// The window end is clamped to the timestamp sequence. If no frame in the
/// window qualifies, `window_start` is returned: the caller's segment then
/// overshoots the cap, but the search always makes progress.
pub fn find_acceptable_frame(
    video: &str,
    window_start: usize,
    window_end: usize,
    timestamps: &[f64],
    last_timestamp: f64,
    max_duration: f64,
) -> usize {
    if window_end > timestamps.len() {
        warn!(
            "Video {}: search window end {} exceeds {} timestamps, clamping",
            video,
            window_end,
            timestamps.len()
        );
    }
    let window_end = window_end.min(timestamps.len());

    (window_start..window_end)
        .rev()
        .find(|&j| timestamps[j] - last_timestamp <= max_duration)
        .unwrap_or_else(|| {
            debug!(
                "Video {}: no frame in [{}, {}) within {:.2}s of {:.2}s, falling back to window start",
                video, window_start, window_end, max_duration, last_timestamp
            );
            window_start
        })
}

fn timestamp_or_warn(video: &str, timestamps: &[f64], index: usize) -> Option<f64> {
    let timestamp = timestamps.get(index).copied();
    if timestamp.is_none() {
        warn!(
            "Video {}: boundary {} has no timestamp ({} available), skipping duration check",
            video,
            index,
            timestamps.len()
        );
    }
    timestamp
}

/// Appends `index` unless it is already present; returns whether it was added
fn push_unique(boundaries: &mut Vec<usize>, index: usize) -> bool {
    if boundaries.contains(&index) {
        false
    } else {
        boundaries.push(index);
        true
    }
}
