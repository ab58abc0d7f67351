//! Keyframe persistence and manifest writing
//!
//! Every clear frame is written as its own image, boundary or not, so that
//! downstream consumers get a dense keyframe set. The segment label only
//! advances on clear frames that start a segment, which groups contiguous
//! frames under one label in the diagnostic composite.

use crate::cancel::CancellationToken;
use crate::quality::is_clear_frame;
use crate::Result;
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use succession_core::artifact::write_png_atomic;
use succession_core::keyframe::is_keyframe_filename;
use succession_core::{
    DiagnosticCell, DiagnosticsSink, Error as CoreError, Frame, KeyframeManifest, KeyframeRecord,
    QualityBounds, TimestampSequence, GRID_FILENAME,
};

/// Inputs of the persistence stage for one video
#[derive(Debug, Clone, Copy)]
pub struct PersistRequest<'a> {
    pub frames: &'a [Frame],
    pub timestamps: &'a TimestampSequence,
    /// Final segment boundaries
    pub boundaries: &'a [usize],
    /// Successor baseline, used for annotation only
    pub baseline: &'a [f64],
    pub quality: &'a QualityBounds,
}

/// What the persistence stage wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedKeyframes {
    pub manifest: KeyframeManifest,
    /// Path of the diagnostic composite, if the sink wrote one
    pub grid_path: Option<PathBuf>,
    /// Number of frames rejected by the quality filter
    pub rejected: usize,
}

/// Writes every clear frame, the diagnostic composite and the manifest into
/// `output_dir`.
///
/// Keyframes, composite and manifest left in `output_dir` by an earlier run are
/// removed first, so the directory only ever holds this run's output. Each
/// artifact is written atomically. The manifest is written last and only lists
/// frames whose image was written. Cancellation is checked before each frame;
/// a cancelled run leaves the images written so far and no manifest.
pub fn persist_keyframes(
    request: PersistRequest<'_>,
    output_dir: &Path,
    sink: &dyn DiagnosticsSink,
    cancel: &CancellationToken,
) -> Result<PersistedKeyframes> {
    let PersistRequest {
        frames,
        timestamps,
        boundaries,
        baseline,
        quality,
    } = request;

    if frames.len() != timestamps.len() {
        return Err(CoreError::InvalidInput(format!(
            "{} frames but {} timestamps",
            frames.len(),
            timestamps.len()
        ))
        .into());
    }

    std::fs::create_dir_all(output_dir)?;
    remove_previous_outputs(output_dir)?;

    let boundary_set: BTreeSet<usize> = boundaries.iter().copied().collect();
    let mut records = Vec::with_capacity(frames.len());
    let mut labels = Vec::with_capacity(frames.len());
    let mut manifest = KeyframeManifest::new();
    let mut segment_counter = 0;
    let mut rejected = 0;

    for (index, (frame, &timestamp)) in frames.iter().zip(timestamps.as_slice()).enumerate() {
        cancel.check()?;

        if !is_clear_frame(frame, quality) {
            debug!(
                "Frame {} rejected (mean intensity {:.1})",
                index,
                frame.mean_intensity()
            );
            rejected += 1;
            continue;
        }

        if boundary_set.contains(&index) {
            segment_counter += 1;
        }

        let record = KeyframeRecord::new(index, timestamp);
        write_png_atomic(&output_dir.join(&record.filename), &frame.image)?;
        manifest.insert(record.clone());
        records.push(record);
        labels.push(segment_counter);
    }

    let cells: Vec<DiagnosticCell<'_>> = records
        .iter()
        .zip(&labels)
        .map(|(record, &segment_label)| DiagnosticCell {
            record,
            segment_label,
            successor_value: baseline.get(record.index).copied(),
            image: &frames[record.index].image,
        })
        .collect();
    let grid_path = sink.render(output_dir, &cells)?;

    let manifest_path = manifest.write_to_dir(output_dir)?;
    info!(
        "Persisted {} keyframes ({} rejected), manifest at {}",
        manifest.len(),
        rejected,
        manifest_path.display()
    );

    Ok(PersistedKeyframes {
        manifest,
        grid_path,
        rejected,
    })
}

/// Deletes the manifest, keyframe images and composite of an earlier run.
///
/// The manifest goes first so an interrupted cleanup never leaves a manifest
/// listing images that are gone. Other files are left alone.
fn remove_previous_outputs(output_dir: &Path) -> Result<()> {
    let manifest_path = KeyframeManifest::path_in(output_dir);
    if manifest_path.is_file() {
        std::fs::remove_file(&manifest_path)?;
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if (is_keyframe_filename(name) || name == GRID_FILENAME) && entry.path().is_file() {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    if removed > 0 {
        debug!(
            "Removed {} stale outputs from {}",
            removed,
            output_dir.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;
    use succession_core::{NullSink, MANIFEST_FILENAME};
    use tempfile::tempdir;

    fn frame(value: u8) -> Frame {
        Frame::new(RgbImage::from_pixel(8, 8, Rgb([value, value, value])))
    }

    /// Records the labels it receives
    #[derive(Default)]
    struct RecordingSink {
        cells: Mutex<Vec<(usize, usize, Option<f64>)>>,
    }

    impl DiagnosticsSink for RecordingSink {
        fn render(
            &self,
            _output_dir: &Path,
            cells: &[DiagnosticCell<'_>],
        ) -> succession_core::Result<Option<PathBuf>> {
            let mut seen = self.cells.lock().unwrap();
            seen.extend(
                cells
                    .iter()
                    .map(|c| (c.record.index, c.segment_label, c.successor_value)),
            );
            Ok(None)
        }
    }

    #[test]
    fn test_persists_every_clear_frame() {
        let dir = tempdir().unwrap();
        let frames = vec![frame(128), frame(0), frame(100), frame(255), frame(90)];
        let timestamps = TimestampSequence::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();

        let persisted = persist_keyframes(
            PersistRequest {
                frames: &frames,
                timestamps: &timestamps,
                boundaries: &[0, 3],
                baseline: &[0.1, 0.2],
                quality: &QualityBounds::default(),
            },
            dir.path(),
            &NullSink,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(persisted.manifest.indices(), vec![0, 2, 4]);
        assert_eq!(persisted.rejected, 2);
        assert!(dir.path().join("keyframe_2_timestamp_2.00.png").is_file());
        assert!(!dir.path().join("keyframe_1_timestamp_1.00.png").exists());

        let on_disk = KeyframeManifest::read_from_dir(dir.path()).unwrap();
        assert_eq!(on_disk, persisted.manifest);
        assert!(on_disk.verify_against_dir(dir.path()).unwrap().is_consistent());
    }

    #[test]
    fn test_label_advances_only_at_clear_boundaries() {
        let dir = tempdir().unwrap();
        let sink = RecordingSink::default();
        // boundary 2 is black, so frames 2..4 stay under label 1
        let frames = vec![frame(128), frame(128), frame(0), frame(128), frame(128)];
        let timestamps = TimestampSequence::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();

        persist_keyframes(
            PersistRequest {
                frames: &frames,
                timestamps: &timestamps,
                boundaries: &[0, 2, 4],
                baseline: &[0.5, 0.5, 0.5],
                quality: &QualityBounds::default(),
            },
            dir.path(),
            &sink,
            &CancellationToken::new(),
        )
        .unwrap();

        let cells = sink.cells.lock().unwrap();
        assert_eq!(
            *cells,
            vec![
                (0, 1, Some(0.5)),
                (1, 1, Some(0.5)),
                (3, 1, None),
                (4, 2, None),
            ]
        );
    }

    #[test]
    fn test_frame_timestamp_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let frames = vec![frame(128), frame(128)];
        let timestamps = TimestampSequence::new(vec![0.0]).unwrap();

        let result = persist_keyframes(
            PersistRequest {
                frames: &frames,
                timestamps: &timestamps,
                boundaries: &[0],
                baseline: &[],
                quality: &QualityBounds::default(),
            },
            dir.path(),
            &NullSink,
            &CancellationToken::new(),
        );

        assert!(result.is_err());
        assert!(!dir.path().join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn test_cancelled_run_writes_no_manifest() {
        let dir = tempdir().unwrap();
        let frames = vec![frame(128), frame(128)];
        let timestamps = TimestampSequence::new(vec![0.0, 1.0]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = persist_keyframes(
            PersistRequest {
                frames: &frames,
                timestamps: &timestamps,
                boundaries: &[0],
                baseline: &[],
                quality: &QualityBounds::default(),
            },
            dir.path(),
            &NullSink,
            &cancel,
        );

        assert!(matches!(result, Err(crate::Error::Cancelled)));
        assert!(!dir.path().join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn test_rerun_removes_stale_keyframes() {
        let dir = tempdir().unwrap();
        let frames = vec![frame(128), frame(128), frame(50)];
        let timestamps = TimestampSequence::new(vec![0.0, 1.0, 2.0]).unwrap();
        std::fs::write(dir.path().join(GRID_FILENAME), b"old grid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        let persist = |quality: QualityBounds| {
            persist_keyframes(
                PersistRequest {
                    frames: &frames,
                    timestamps: &timestamps,
                    boundaries: &[0],
                    baseline: &[],
                    quality: &quality,
                },
                dir.path(),
                &NullSink,
                &CancellationToken::new(),
            )
            .unwrap()
        };

        let first = persist(QualityBounds::default());
        assert_eq!(first.manifest.indices(), vec![0, 1, 2]);

        let second = persist(QualityBounds {
            lower: 100.0,
            upper: 245.0,
        });
        assert_eq!(second.manifest.indices(), vec![0, 1]);
        assert!(!dir.path().join("keyframe_2_timestamp_2.00.png").exists());
        assert!(!dir.path().join(GRID_FILENAME).exists());
        assert!(dir.path().join("notes.txt").is_file());

        let on_disk = KeyframeManifest::read_from_dir(dir.path()).unwrap();
        assert_eq!(on_disk, second.manifest);
        assert!(on_disk.verify_against_dir(dir.path()).unwrap().is_consistent());
    }
}
