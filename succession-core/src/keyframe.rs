//! Keyframe records

use serde::{Deserialize, Serialize};

/// File name prefix shared by every persisted keyframe image
pub const KEYFRAME_PREFIX: &str = "keyframe_";

/// A persisted keyframe: one frame that passed the quality filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeRecord {
    /// Index of the frame in the candidate keyframe sequence
    pub index: usize,
    /// Timestamp of the frame in seconds
    #[serde(rename = "time_frame")]
    pub timestamp: f64,
    /// Image file name, relative to the video's output directory
    pub filename: String,
}

impl KeyframeRecord {
    /// Creates the record for frame `index`, deriving its file name
    pub fn new(index: usize, timestamp: f64) -> Self {
        Self {
            index,
            timestamp,
            filename: keyframe_filename(index, timestamp),
        }
    }
}

/// File name of the image persisted for frame `index` at `timestamp` seconds
pub fn keyframe_filename(index: usize, timestamp: f64) -> String {
    format!("{KEYFRAME_PREFIX}{index}_timestamp_{timestamp:.2}.png")
}

/// Returns true if `name` looks like a persisted keyframe image
pub fn is_keyframe_filename(name: &str) -> bool {
    name.starts_with(KEYFRAME_PREFIX) && name.contains("_timestamp_") && name.ends_with(".png")
}
