//! Dataset access for the batch driver
//!
//! The batch driver iterates explicit [`VideoId`]s and asks a [`VideoSource`]
//! to load each one. [`DirectoryDataset`] is the on-disk implementation:
//!
//! ```text
//! <root>/<frames_dir>/<id>/*.png + <timestamps_file>
//! <root>/<embeddings_dir>/<id>.npy   or   <root>/<embeddings_dir>/<id>/*.npy
//! <root>/<videos_dir>/<id>.mp4       (+ optional <id>.json with "duration")
//! ```

use crate::analyzer::VideoInput;
use crate::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use succession_core::npy::read_npy_file;
use succession_core::{DatasetLayout, EmbeddingSequence, Frame};

/// Raw video extensions recognised when checking that a video exists
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi"];

/// Candidate keyframe image extensions
pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Identifier of one video in a dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Why a video was skipped without being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No embedding file exists for the video
    MissingEmbeddings,
    /// Embedding files exist but none could be loaded
    UnloadableEmbeddings,
    /// No raw video file exists for the video
    MissingVideo,
    /// No candidate keyframe directory exists for the video
    MissingFrames,
    /// The keyframe directory has no timestamp file
    MissingTimestamps,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            SkipReason::MissingEmbeddings => "missing embedding files",
            SkipReason::UnloadableEmbeddings => "failed to load any arrays from embedding files",
            SkipReason::MissingVideo => "no video file found",
            SkipReason::MissingFrames => "no keyframe directory found",
            SkipReason::MissingTimestamps => "no timestamp file found",
        };
        f.write_str(message)
    }
}

/// Result of loading one video
#[derive(Debug)]
pub enum VideoLoad {
    Ready(Box<VideoInput>),
    Skipped(SkipReason),
}

/// A collection of videos the batch driver can analyze
pub trait VideoSource: Sync {
    /// Every video identifier in the dataset, in processing order
    fn video_ids(&self) -> Result<Vec<VideoId>>;

    /// Loads the analysis inputs of one video
    fn load(&self, id: &VideoId) -> Result<VideoLoad>;

    /// Directory receiving the outputs of one video
    fn output_dir(&self, id: &VideoId) -> PathBuf;
}

/// Metadata sidecar written next to a raw video
#[derive(Debug, Deserialize)]
struct VideoMetadata {
    duration: Option<f64>,
}

/// Dataset stored as directories under one root
#[derive(Debug, Clone)]
pub struct DirectoryDataset {
    root: PathBuf,
    layout: DatasetLayout,
    output_root: PathBuf,
}

impl DirectoryDataset {
    /// Opens a dataset; outputs go to `<root>/<layout.output_dir>`
    pub fn new(root: impl Into<PathBuf>, layout: DatasetLayout) -> Self {
        let root = root.into();
        let output_root = root.join(&layout.output_dir);
        Self {
            root,
            layout,
            output_root,
        }
    }

    /// Sends outputs to `output_root` instead of the dataset root
    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn frames_dir(&self, id: &VideoId) -> PathBuf {
        self.root.join(&self.layout.frames_dir).join(id.as_str())
    }

    /// `<id>.npy` if present, else every `.npy` file in `<id>/` in lexical order
    fn embedding_files(&self, id: &VideoId) -> Result<Vec<PathBuf>> {
        let base = self.root.join(&self.layout.embeddings_dir);
        let single = base.join(format!("{}.npy", id));
        if single.is_file() {
            return Ok(vec![single]);
        }

        let dir = base.join(id.as_str());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = files_with_extension(&dir, &["npy"])?;
        files.sort();
        Ok(files)
    }

    fn load_embeddings(&self, id: &VideoId, files: &[PathBuf]) -> Option<EmbeddingSequence> {
        let mut embeddings: Option<EmbeddingSequence> = None;
        for path in files {
            match read_npy_file(path) {
                Ok(array) => {
                    debug!("Loaded {} embeddings from {}", array.len(), path.display());
                    embeddings.get_or_insert_with(EmbeddingSequence::default).extend(array);
                }
                Err(e) => warn!(
                    "Video {}: could not load embedding file {}: {}",
                    id,
                    path.display(),
                    e
                ),
            }
        }
        embeddings
    }

    fn video_file(&self, id: &VideoId) -> Option<PathBuf> {
        let dir = self.root.join(&self.layout.videos_dir);
        VIDEO_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", id, ext)))
            .find(|path| path.is_file())
    }

    /// Duration from the `<id>.json` sidecar, if it exists and is readable
    fn sidecar_duration(&self, id: &VideoId) -> Option<f64> {
        let path = self
            .root
            .join(&self.layout.videos_dir)
            .join(format!("{}.json", id));
        let json = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<VideoMetadata>(&json) {
            Ok(metadata) => metadata.duration,
            Err(e) => {
                warn!("Video {}: ignoring unreadable metadata {}: {}", id, path.display(), e);
                None
            }
        }
    }

    fn load_frames(&self, dir: &Path) -> Result<Vec<Frame>> {
        let mut files = files_with_extension(dir, FRAME_EXTENSIONS)?;
        files.sort_by_cached_key(|path| frame_sort_key(path));

        files
            .iter()
            .map(|path| Ok(Frame::new(image::open(path)?.to_rgb8())))
            .collect()
    }
}

impl VideoSource for DirectoryDataset {
    fn video_ids(&self) -> Result<Vec<VideoId>> {
        let frames_root = self.root.join(&self.layout.frames_dir);
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&frames_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(VideoId::new(entry.file_name().to_string_lossy()));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: &VideoId) -> Result<VideoLoad> {
        let embedding_files = self.embedding_files(id)?;
        if embedding_files.is_empty() {
            return Ok(VideoLoad::Skipped(SkipReason::MissingEmbeddings));
        }
        let Some(embeddings) = self.load_embeddings(id, &embedding_files) else {
            return Ok(VideoLoad::Skipped(SkipReason::UnloadableEmbeddings));
        };

        let Some(video_file) = self.video_file(id) else {
            return Ok(VideoLoad::Skipped(SkipReason::MissingVideo));
        };
        debug!("Video {}: raw video at {}", id, video_file.display());

        let frames_dir = self.frames_dir(id);
        if !frames_dir.is_dir() {
            return Ok(VideoLoad::Skipped(SkipReason::MissingFrames));
        }
        let timestamps_path = frames_dir.join(&self.layout.timestamps_file);
        if !timestamps_path.is_file() {
            return Ok(VideoLoad::Skipped(SkipReason::MissingTimestamps));
        }
        let timestamps: Vec<f64> =
            serde_json::from_str(&std::fs::read_to_string(&timestamps_path)?)?;
        let frames = self.load_frames(&frames_dir)?;

        let total_duration = self
            .sidecar_duration(id)
            .or_else(|| timestamps.last().copied())
            .unwrap_or(0.0);

        Ok(VideoLoad::Ready(Box::new(VideoInput {
            total_duration,
            embeddings,
            frames,
            timestamps,
        })))
    }

    fn output_dir(&self, id: &VideoId) -> PathBuf {
        self.output_root.join(id.as_str())
    }
}

fn files_with_extension(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Orders frame files by the first number in their name, then by name, so
/// that `frame_10.png` follows `frame_9.png`
fn frame_sort_key(path: &Path) -> (u64, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let number = name
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(u64::MAX);
    (number, name)
}
