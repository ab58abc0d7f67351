//! Diagnostics sink
//!
//! The keyframe persister hands every persisted frame to a sink together with
//! the record the manifest receives. Rendering the composite image lives in a
//! separate crate, so the segmentation pipeline runs without any graphics code.

use crate::{KeyframeRecord, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// File name of the diagnostic composite inside a video's output directory
pub const GRID_FILENAME: &str = "keyframes_grid.png";

/// One persisted frame as seen by a diagnostics sink
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticCell<'a> {
    /// The manifest record of the frame
    pub record: &'a KeyframeRecord,
    /// Segment label counter at this frame (starts at 1 on the first boundary)
    pub segment_label: usize,
    /// Successor baseline at the frame index, `None` past its end
    pub successor_value: Option<f64>,
    /// Frame pixels
    pub image: &'a RgbImage,
}

/// Receives the persisted keyframes of one video once they are all written
pub trait DiagnosticsSink: Send + Sync {
    /// Produces the diagnostic artifact for one video inside `output_dir`.
    ///
    /// Returns the path of the written artifact, or `None` if nothing was
    /// written.
    fn render(&self, output_dir: &Path, cells: &[DiagnosticCell<'_>]) -> Result<Option<PathBuf>>;
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn render(&self, _output_dir: &Path, _cells: &[DiagnosticCell<'_>]) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}
