//! Batch driver
//!
//! Analyzes every video of a [`VideoSource`] on a worker pool. A video that is
//! skipped, empty or failed is recorded in the [`BatchReport`] and the batch
//! moves on.

use crate::analyzer::{is_invalid_input, SegmentAnalyzer};
use crate::cancel::CancellationToken;
use crate::dataset::{SkipReason, VideoId, VideoLoad, VideoSource};
use crate::progress::BatchProgress;
use crate::{Error, Result};
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use succession_core::ThresholdConfig;

/// Outcome of one video in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VideoStatus {
    /// Keyframes and manifest were written
    Analyzed { boundaries: usize, keyframes: usize },
    /// Analysis ran but found nothing to segment
    Empty { reason: String },
    /// Inputs were missing or unloadable
    Skipped { reason: SkipReason },
    /// Analysis failed
    Failed { error: String },
    /// Cancellation was requested before the video finished
    Cancelled,
}

/// Status of one video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoReport {
    pub id: VideoId,
    #[serde(flatten)]
    pub status: VideoStatus,
    /// Wall time spent loading and analyzing the video
    pub elapsed_secs: f64,
}

/// Per-video outcomes of a batch, in processing order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub videos: Vec<VideoReport>,
    /// Wall time of the whole batch
    pub elapsed_secs: f64,
}

impl BatchReport {
    fn count(&self, predicate: impl Fn(&VideoStatus) -> bool) -> usize {
        self.videos.iter().filter(|v| predicate(&v.status)).count()
    }

    pub fn analyzed(&self) -> usize {
        self.count(|s| matches!(s, VideoStatus::Analyzed { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|s| matches!(s, VideoStatus::Empty { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, VideoStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, VideoStatus::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, VideoStatus::Cancelled))
    }

    /// Total keyframes written across the batch
    pub fn keyframes(&self) -> usize {
        self.videos
            .iter()
            .map(|v| match v.status {
                VideoStatus::Analyzed { keyframes, .. } => keyframes,
                _ => 0,
            })
            .sum()
    }

    pub fn status_of(&self, id: &VideoId) -> Option<&VideoStatus> {
        self.videos.iter().find(|v| &v.id == id).map(|v| &v.status)
    }

    /// The video that took longest
    pub fn slowest(&self) -> Option<&VideoReport> {
        self.videos
            .iter()
            .max_by(|a, b| a.elapsed_secs.total_cmp(&b.elapsed_secs))
    }
}

/// Runs the analyzer over many videos
#[derive(Debug)]
pub struct BatchRunner {
    analyzer: SegmentAnalyzer,
    thresholds: ThresholdConfig,
    max_segment_duration: Option<u64>,
    jobs: usize,
    cancel: CancellationToken,
}

impl BatchRunner {
    /// Creates a sequential runner; `thresholds` is the default for every video
    pub fn new(analyzer: SegmentAnalyzer, thresholds: ThresholdConfig) -> Self {
        Self {
            analyzer,
            thresholds,
            max_segment_duration: None,
            jobs: 1,
            cancel: CancellationToken::new(),
        }
    }

    /// Number of videos analyzed concurrently (at least 1)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Duration cap applied to every video, overriding the thresholds' own
    pub fn with_max_segment_duration(mut self, seconds: Option<u64>) -> Self {
        self.max_segment_duration = seconds;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Analyzes `selection`, or every video of `source` when it is `None`.
    ///
    /// Only failing to enumerate the source or to start the worker pool is an
    /// error; per-video problems end up in the report.
    pub fn run(&self, source: &dyn VideoSource, selection: Option<&[VideoId]>) -> Result<BatchReport> {
        self.thresholds.validate()?;

        let ids = match selection {
            Some(ids) => ids.to_vec(),
            None => source.video_ids()?,
        };
        info!("Analyzing {} videos with {} workers", ids.len(), self.jobs);

        let progress = BatchProgress::new(ids.len(), 10);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()?;

        let videos = pool.install(|| {
            ids.par_iter()
                .map(|id| {
                    let (status, elapsed_secs) = progress.track(id, || self.run_one(source, id));
                    VideoReport {
                        id: id.clone(),
                        status,
                        elapsed_secs,
                    }
                })
                .collect()
        });

        let report = BatchReport {
            videos,
            elapsed_secs: progress.elapsed_secs(),
        };
        info!(
            "Batch finished in {:.1}s: {} analyzed, {} empty, {} skipped, {} failed, {} cancelled",
            report.elapsed_secs,
            report.analyzed(),
            report.empty(),
            report.skipped(),
            report.failed(),
            report.cancelled()
        );
        Ok(report)
    }

    fn run_one(&self, source: &dyn VideoSource, id: &VideoId) -> VideoStatus {
        if self.cancel.is_cancelled() {
            return VideoStatus::Cancelled;
        }

        let input = match source.load(id) {
            Ok(VideoLoad::Ready(input)) => *input,
            Ok(VideoLoad::Skipped(reason)) => {
                warn!("Skipping video {}: {}", id, reason);
                return VideoStatus::Skipped { reason };
            }
            Err(e) => {
                error!("Video {}: failed to load inputs: {}", id, e);
                return VideoStatus::Failed {
                    error: e.to_string(),
                };
            }
        };

        let output_dir = source.output_dir(id);
        let result = self.analyzer.analyze_input(
            id,
            input,
            &self.thresholds,
            self.max_segment_duration,
            &output_dir,
            &self.cancel,
        );

        match result {
            Ok(outcome) => match outcome.empty_reason {
                Some(reason) => {
                    info!("Video {}: {}", id, reason);
                    VideoStatus::Empty {
                        reason: reason.to_string(),
                    }
                }
                None => {
                    info!(
                        "Video {}: {} boundaries, {} keyframes",
                        id,
                        outcome.boundaries.len(),
                        outcome.manifest.len()
                    );
                    VideoStatus::Analyzed {
                        boundaries: outcome.boundaries.len(),
                        keyframes: outcome.manifest.len(),
                    }
                }
            },
            Err(Error::Cancelled) => {
                warn!("Video {}: cancelled", id);
                VideoStatus::Cancelled
            }
            Err(e) => {
                if is_invalid_input(&e) {
                    error!("Video {}: invalid input: {}", id, e);
                } else {
                    error!("Video {}: analysis failed: {}", id, e);
                }
                VideoStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
