//! Succession Engine Library
//!
//! This library decides where one semantic segment of a video ends and the
//! next begins, from the video's embedding trajectory, and persists the clear
//! keyframes with their manifest.
//!
//! The pipeline is a chain of pure stages:
//! distance → successor baseline → boundaries → duration capping, then
//! quality filtering → keyframe persistence. [`SegmentAnalyzer`] drives it for
//! one video and [`BatchRunner`] drives it across a dataset.

pub mod analyzer;
pub mod batch;
pub mod boundary;
pub mod cancel;
pub mod dataset;
pub mod distance;
pub mod duration;
#[cfg(test)]
mod log_capture;
pub mod persist;
pub mod progress;
pub mod quality;
pub mod successor;

pub use analyzer::{AnalysisOutcome, SegmentAnalyzer, VideoAnalysisContext, VideoInput};
pub use batch::{BatchReport, BatchRunner, VideoReport, VideoStatus};
pub use cancel::CancellationToken;
pub use dataset::{DirectoryDataset, SkipReason, VideoId, VideoLoad, VideoSource};
pub use successor::{BaselineEstimator, RollingMedianBaseline};

/// Result type for succession-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for succession-engine operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Succession core error: {0}")]
    Core(#[from] succession_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Analysis cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true for embedding dimensionality faults, which skip a video
    /// rather than fail it
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(
            self,
            Error::Core(succession_core::Error::DimensionMismatch { .. })
        )
    }
}
