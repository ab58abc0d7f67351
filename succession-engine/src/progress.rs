//! Batch progress
//!
//! Counts finished videos across worker threads and times each one. The
//! per-video times end up in the [`crate::BatchReport`].

use crate::batch::VideoStatus;
use crate::dataset::VideoId;
use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Shared progress of one batch
#[derive(Debug)]
pub struct BatchProgress {
    total: usize,
    report_every: usize,
    finished: AtomicUsize,
    not_analyzed: AtomicUsize,
    started: Instant,
}

impl BatchProgress {
    /// Progress over `total` videos, logged every `report_every` videos and
    /// once all are finished
    pub fn new(total: usize, report_every: usize) -> Self {
        Self {
            total,
            report_every: report_every.max(1),
            finished: AtomicUsize::new(0),
            not_analyzed: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Relaxed)
    }

    /// Videos that finished with any status but `Analyzed`
    pub fn not_analyzed(&self) -> usize {
        self.not_analyzed.load(Ordering::Relaxed)
    }

    /// Seconds since the batch started
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Runs `analyze` for video `id`, counts its status and returns it with
    /// the seconds it took
    pub fn track(
        &self,
        id: &VideoId,
        analyze: impl FnOnce() -> VideoStatus,
    ) -> (VideoStatus, f64) {
        let started = Instant::now();
        let status = analyze();
        let elapsed_secs = started.elapsed().as_secs_f64();

        if !matches!(status, VideoStatus::Analyzed { .. }) {
            self.not_analyzed.fetch_add(1, Ordering::Relaxed);
        }
        let finished = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Video {}: finished in {:.2}s", id, elapsed_secs);

        if finished % self.report_every == 0 || finished == self.total {
            info!(
                "Videos {}/{} finished, {} not analyzed, {:.1}s elapsed",
                finished,
                self.total,
                self.not_analyzed(),
                self.elapsed_secs()
            );
        }

        (status, elapsed_secs)
    }
}
