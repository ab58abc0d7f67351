//! Per-video segmentation analysis
//!
//! [`SegmentAnalyzer`] holds only video-independent settings. Everything that
//! belongs to one video travels in a [`VideoAnalysisContext`] built for that
//! video alone, so analyses of different videos never share mutable state.

use crate::boundary::{detect_boundaries, segments_from_boundaries, Segment};
use crate::cancel::CancellationToken;
use crate::dataset::VideoId;
use crate::distance::consecutive_distances;
use crate::duration::cap_segment_durations;
use crate::persist::{persist_keyframes, PersistRequest};
use crate::successor::{BaselineEstimator, RollingMedianBaseline};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use succession_core::{
    DiagnosticsSink, EmbeddingSequence, Error as CoreError, Frame, KeyframeManifest, NullSink,
    QualityBounds, ThresholdConfig, TimestampSequence,
};

/// Label of a context built without one
const UNLABELED: &str = "unlabeled";

/// Read-only inputs of one video's analysis
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAnalysisContext {
    label: String,
    total_duration: f64,
    embeddings: EmbeddingSequence,
    thresholds: ThresholdConfig,
    max_segment_duration: Option<u64>,
}

impl VideoAnalysisContext {
    /// Binds the inputs of one video.
    ///
    /// Fails with `InvalidInput` if `total_duration` is not a finite,
    /// non-negative number of seconds or if the embeddings hold empty rows or
    /// non-finite values.
    pub fn new(
        total_duration: f64,
        embeddings: EmbeddingSequence,
        thresholds: ThresholdConfig,
        max_segment_duration: Option<u64>,
    ) -> Result<Self> {
        if !total_duration.is_finite() || total_duration < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "total duration must be a finite number of seconds, got {}",
                total_duration
            ))
            .into());
        }
        embeddings.validate_numeric()?;

        Ok(Self {
            label: UNLABELED.to_string(),
            total_duration,
            embeddings,
            thresholds,
            max_segment_duration,
        })
    }

    /// Names the video in log output
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// The complete embedding trajectory of the video
    pub fn embeddings(&self) -> &EmbeddingSequence {
        &self.embeddings
    }

    /// Thresholds used when the caller passes none
    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn max_segment_duration(&self) -> Option<u64> {
        self.max_segment_duration
    }

    /// Duration cap in seconds: the context's own value, else the one in
    /// `thresholds`
    pub fn effective_max_duration(&self, thresholds: &ThresholdConfig) -> Option<f64> {
        self.max_segment_duration
            .or(thresholds.max_duration)
            .map(|seconds| seconds as f64)
    }
}

/// Everything loaded for one video before analysis
#[derive(Debug, Clone)]
pub struct VideoInput {
    /// Length of the raw video in seconds
    pub total_duration: f64,
    /// Complete embedding trajectory
    pub embeddings: EmbeddingSequence,
    /// Candidate keyframes in temporal order
    pub frames: Vec<Frame>,
    /// Timestamp in seconds of each candidate keyframe
    pub timestamps: Vec<f64>,
}

/// Why an analysis produced nothing
#[derive(Debug, Clone, PartialEq)]
pub enum EmptyReason {
    /// Fewer than two frame/embedding pairs
    InsufficientFrames { pairs: usize },
    /// Embedding rows of differing width
    DimensionMismatch(String),
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::InsufficientFrames { pairs } => {
                write!(f, "insufficient frames ({} frame/embedding pairs)", pairs)
            }
            EmptyReason::DimensionMismatch(message) => {
                write!(f, "embedding dimension mismatch: {}", message)
            }
        }
    }
}

/// Boundaries of one video before anything is written
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// Distance between each consecutive pair of analyzed embeddings
    pub distances: Vec<f64>,
    /// Successor baseline over the complete trajectory
    pub baseline: Vec<f64>,
    /// Boundaries before duration capping
    pub detected: Vec<usize>,
    /// Final boundaries
    pub boundaries: Vec<usize>,
}

/// Result of analyzing one video
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOutcome {
    /// Final segment boundaries
    pub boundaries: Vec<usize>,
    /// Manifest of the persisted keyframes
    pub manifest: KeyframeManifest,
    /// Diagnostic composite, if one was written
    pub grid_path: Option<PathBuf>,
    /// Frames dropped by the quality filter
    pub rejected: usize,
    /// Set when nothing was analyzed
    pub empty_reason: Option<EmptyReason>,
}

impl AnalysisOutcome {
    /// An outcome with no boundaries and no keyframes
    pub fn empty(reason: EmptyReason) -> Self {
        Self {
            empty_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty_reason.is_some()
    }

    /// Segments spanned by the boundaries over `frame_count` frames
    pub fn segments(&self, frame_count: usize) -> Vec<Segment> {
        segments_from_boundaries(&self.boundaries, frame_count)
    }
}

/// Runs the segmentation pipeline for one video at a time
pub struct SegmentAnalyzer {
    quality: QualityBounds,
    estimator: Box<dyn BaselineEstimator>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl Default for SegmentAnalyzer {
    fn default() -> Self {
        Self::new(QualityBounds::default())
    }
}

impl SegmentAnalyzer {
    /// Creates an analyzer with the rolling-median baseline and no diagnostics
    pub fn new(quality: QualityBounds) -> Self {
        Self {
            quality,
            estimator: Box::new(RollingMedianBaseline::default()),
            sink: Arc::new(NullSink),
        }
    }

    /// Replaces the successor baseline estimator
    pub fn with_estimator(mut self, estimator: Box<dyn BaselineEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Replaces the diagnostics sink
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn quality(&self) -> &QualityBounds {
        &self.quality
    }

    /// Computes the final boundaries of `paired` embeddings.
    ///
    /// `paired` are the leading embeddings matched 1:1 with `timestamps`; the
    /// baseline is taken over the complete trajectory of the context.
    pub fn segment(
        &self,
        context: &VideoAnalysisContext,
        paired: &EmbeddingSequence,
        timestamps: &TimestampSequence,
        thresholds: &ThresholdConfig,
    ) -> Result<Segmentation> {
        let distances = consecutive_distances(paired)?;
        let baseline = self.estimator.estimate(context.embeddings())?;
        let detected = detect_boundaries(&distances, &baseline, thresholds);
        let boundaries = cap_segment_durations(
            context.label(),
            &detected,
            timestamps.as_slice(),
            context.effective_max_duration(thresholds),
        );

        debug!(
            "Video {}: {} detected boundaries, {} after duration capping",
            context.label(),
            detected.len(),
            boundaries.len()
        );

        Ok(Segmentation {
            distances,
            baseline,
            detected,
            boundaries,
        })
    }

    /// Analyzes one video and writes its keyframes into `output_dir`.
    ///
    /// `thresholds` overrides the context's thresholds when given. Fewer than
    /// two frame/embedding pairs, or embeddings of differing width, give an
    /// empty outcome and write nothing. Invalid thresholds or timestamps fail
    /// the call.
    pub fn analyze(
        &self,
        context: &VideoAnalysisContext,
        frames: &[Frame],
        timestamps: &[f64],
        thresholds: Option<&ThresholdConfig>,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome> {
        cancel.check()?;

        let thresholds = thresholds.unwrap_or(context.thresholds());
        thresholds.validate()?;

        if timestamps.len() != frames.len() {
            return Err(CoreError::InvalidInput(format!(
                "{} frames but {} timestamps",
                frames.len(),
                timestamps.len()
            ))
            .into());
        }
        let mut timestamps = TimestampSequence::new(timestamps.to_vec())?;

        let embedding_count = context.embeddings().len();
        let pairs = frames.len().min(embedding_count);
        if frames.len() != embedding_count {
            warn!(
                "Video {}: {} frames but {} embeddings, analyzing the first {}",
                context.label(),
                frames.len(),
                embedding_count,
                pairs
            );
        }
        if pairs < 2 {
            info!(
                "Video {}: only {} frame/embedding pairs, nothing written to {}",
                context.label(),
                pairs,
                output_dir.display()
            );
            return Ok(AnalysisOutcome::empty(EmptyReason::InsufficientFrames {
                pairs,
            }));
        }

        timestamps.truncate(pairs);
        let frames = &frames[..pairs];
        let paired = context.embeddings().prefix(pairs);

        let segmentation = match self.segment(context, &paired, &timestamps, thresholds) {
            Ok(segmentation) => segmentation,
            Err(e) if e.is_dimension_mismatch() => {
                warn!("Video {}: skipped, {}", context.label(), e);
                return Ok(AnalysisOutcome::empty(EmptyReason::DimensionMismatch(
                    e.to_string(),
                )));
            }
            Err(e) => return Err(e),
        };

        if let Some(last) = timestamps.last() {
            if last > context.total_duration() {
                warn!(
                    "Video {}: last timestamp {:.2}s is past the video duration {:.2}s",
                    context.label(),
                    last,
                    context.total_duration()
                );
            }
        }

        let persisted = persist_keyframes(
            PersistRequest {
                frames,
                timestamps: &timestamps,
                boundaries: &segmentation.boundaries,
                baseline: &segmentation.baseline,
                quality: &self.quality,
            },
            output_dir,
            self.sink.as_ref(),
            cancel,
        )?;

        Ok(AnalysisOutcome {
            boundaries: segmentation.boundaries,
            manifest: persisted.manifest,
            grid_path: persisted.grid_path,
            rejected: persisted.rejected,
            empty_reason: None,
        })
    }

    /// Builds the context of loaded video `id` and analyzes it
    pub fn analyze_input(
        &self,
        id: &VideoId,
        input: VideoInput,
        thresholds: &ThresholdConfig,
        max_segment_duration: Option<u64>,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let VideoInput {
            total_duration,
            embeddings,
            frames,
            timestamps,
        } = input;
        let context =
            VideoAnalysisContext::new(total_duration, embeddings, *thresholds, max_segment_duration)?
                .with_label(id.as_str());
        self.analyze(&context, &frames, &timestamps, None, output_dir, cancel)
    }
}

impl fmt::Debug for SegmentAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentAnalyzer")
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}

/// True if `error` came from malformed caller input rather than from the data
pub(crate) fn is_invalid_input(error: &Error) -> bool {
    matches!(
        error,
        Error::Core(
            CoreError::InvalidInput(_)
                | CoreError::InvalidConfig(_)
                | CoreError::NonMonotonicTimestamps { .. }
        )
    )
}
