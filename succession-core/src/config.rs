//! Segmentation configuration
//!
//! `SegmentationConfig` is loaded from a JSON file where every field is
//! optional. Thresholds that are `null` or absent are unset: the rule they
//! drive is disabled rather than compared against zero.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default lower bound of the mean grayscale intensity of a clear frame
pub const DEFAULT_QUALITY_LOWER: f64 = 10.0;

/// Default upper bound of the mean grayscale intensity of a clear frame
pub const DEFAULT_QUALITY_UPPER: f64 = 245.0;

/// Default window of the rolling-median successor baseline
pub const DEFAULT_BASELINE_WINDOW: usize = 5;

/// Boundary and duration thresholds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum deviation of a consecutive distance above the successor baseline
    pub successor_value: Option<f64>,
    /// Secondary deviation threshold; when both are set the larger governs
    pub phash_threshold: Option<f64>,
    /// Maximum segment duration in seconds
    pub max_duration: Option<u64>,
}

impl ThresholdConfig {
    /// Deviation thresholds that are set, in declaration order
    pub fn deviation_thresholds(&self) -> impl Iterator<Item = f64> {
        [self.successor_value, self.phash_threshold].into_iter().flatten()
    }

    /// Rejects negative or non-finite thresholds
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("successor_value", self.successor_value),
            ("phash_threshold", self.phash_threshold),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "{name} must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Mean-intensity bounds of the frame quality filter (exclusive, 0-255 scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self {
            lower: DEFAULT_QUALITY_LOWER,
            upper: DEFAULT_QUALITY_UPPER,
        }
    }
}

impl QualityBounds {
    /// Returns true if `intensity` lies strictly between the bounds
    pub fn contains(&self, intensity: f64) -> bool {
        self.lower < intensity && intensity < self.upper
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower >= self.upper {
            return Err(Error::InvalidConfig(format!(
                "quality bounds must satisfy lower < upper, got ({}, {})",
                self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// Directory names of a dataset, relative to its root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    /// One subdirectory of candidate keyframe images per video
    pub frames_dir: String,
    /// `<id>.npy` or `<id>/*.npy` per video
    pub embeddings_dir: String,
    /// Raw videos `<id>.<ext>` and metadata sidecars `<id>.json`
    pub videos_dir: String,
    /// One output subdirectory per video
    pub output_dir: String,
    /// Timestamp file inside each video's frames directory
    pub timestamps_file: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            frames_dir: "keyframes".to_string(),
            embeddings_dir: "keyframeembeddings".to_string(),
            videos_dir: "originalvideos".to_string(),
            output_dir: "keyframe_outputs".to_string(),
            timestamps_file: "timestamps.json".to_string(),
        }
    }
}

/// Complete configuration of a segmentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub thresholds: ThresholdConfig,
    pub quality: QualityBounds,
    /// Window of the rolling-median successor baseline
    pub baseline_window: usize,
    /// Whether the diagnostic grid is rendered
    pub render_grid: bool,
    /// Columns of the diagnostic grid
    pub grid_columns: usize,
    /// Edge length of one diagnostic grid thumbnail in pixels
    pub grid_cell_size: u32,
    /// Number of videos analyzed concurrently by the batch driver
    pub jobs: usize,
    pub layout: DatasetLayout,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            quality: QualityBounds::default(),
            baseline_window: DEFAULT_BASELINE_WINDOW,
            render_grid: true,
            grid_columns: 4,
            grid_cell_size: 256,
            jobs: 1,
            layout: DatasetLayout::default(),
        }
    }
}

impl SegmentationConfig {
    /// Loads and validates a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses and validates a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.quality.validate()?;
        if self.baseline_window == 0 {
            return Err(Error::InvalidConfig("baseline_window must be at least 1".into()));
        }
        if self.grid_columns == 0 || self.grid_cell_size == 0 {
            return Err(Error::InvalidConfig(
                "grid_columns and grid_cell_size must be at least 1".into(),
            ));
        }
        if self.jobs == 0 {
            return Err(Error::InvalidConfig("jobs must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_thresholds_unset() {
        let config = SegmentationConfig::default();
        assert_eq!(config.thresholds.successor_value, None);
        assert_eq!(config.thresholds.phash_threshold, None);
        assert_eq!(config.thresholds.max_duration, None);
        assert_eq!(config.quality, QualityBounds { lower: 10.0, upper: 245.0 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SegmentationConfig::from_json(
            r#"{"thresholds": {"successor_value": 0.4, "phash_threshold": null, "max_duration": 30},
                "layout": {"frames_dir": "frames"}}"#,
        )
        .unwrap();

        assert_eq!(config.thresholds.successor_value, Some(0.4));
        assert_eq!(config.thresholds.phash_threshold, None);
        assert_eq!(config.thresholds.max_duration, Some(30));
        assert_eq!(config.layout.frames_dir, "frames");
        assert_eq!(config.layout.embeddings_dir, "keyframeembeddings");
        assert_eq!(config.baseline_window, DEFAULT_BASELINE_WINDOW);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(SegmentationConfig::from_json(r#"{"thresholds": {"successor_value": -1.0}}"#).is_err());
        assert!(SegmentationConfig::from_json(r#"{"quality": {"lower": 200, "upper": 100}}"#).is_err());
        assert!(SegmentationConfig::from_json(r#"{"baseline_window": 0}"#).is_err());
        assert!(SegmentationConfig::from_json(r#"{"jobs": 0}"#).is_err());
    }

    #[test]
    fn test_deviation_thresholds_skip_unset() {
        let thresholds = ThresholdConfig {
            successor_value: None,
            phash_threshold: Some(0.2),
            max_duration: None,
        };
        assert_eq!(thresholds.deviation_thresholds().collect::<Vec<_>>(), vec![0.2]);
    }

    #[test]
    fn test_quality_bounds_are_exclusive() {
        let bounds = QualityBounds::default();
        assert!(!bounds.contains(10.0));
        assert!(bounds.contains(10.5));
        assert!(!bounds.contains(245.0));
    }
}
