//! Succession Core Library
//!
//! This library provides the data model shared by the successor segmentation
//! engine and its collaborators: embedding and timestamp sequences, keyframe
//! records and manifests, threshold configuration, the `.npy` embedding reader
//! and the diagnostics sink seam.

pub mod artifact;
pub mod config;
pub mod diagnostics;
pub mod embedding;
pub mod frame;
pub mod keyframe;
pub mod manifest;
pub mod npy;
pub mod timeline;

pub use config::{DatasetLayout, QualityBounds, SegmentationConfig, ThresholdConfig};
pub use diagnostics::{DiagnosticCell, DiagnosticsSink, NullSink, GRID_FILENAME};
pub use embedding::EmbeddingSequence;
pub use frame::Frame;
pub use keyframe::KeyframeRecord;
pub use manifest::{KeyframeManifest, ManifestDiscrepancies, MANIFEST_FILENAME};
pub use timeline::TimestampSequence;

/// Result type for succession-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for succession-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Timestamp {index} ({value}) is earlier than its predecessor")]
    NonMonotonicTimestamps { index: usize, value: f64 },

    #[error("Malformed embedding file: {0}")]
    MalformedEmbeddings(String),

    #[error("Diagnostics error: {0}")]
    Diagnostics(String),
}
