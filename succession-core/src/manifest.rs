//! Keyframe manifest (`keyframe_data.json`) serialization

use crate::artifact::write_bytes_atomic;
use crate::keyframe::is_keyframe_filename;
use crate::{KeyframeRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the manifest inside a video's output directory
pub const MANIFEST_FILENAME: &str = "keyframe_data.json";

/// Index of every persisted keyframe of one video.
///
/// Serialized as a JSON object keyed by the frame index (as a string), each
/// value being `{index, time_frame, filename}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeManifest {
    records: BTreeMap<usize, KeyframeRecord>,
}

/// Differences between a manifest and the files present beside it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestDiscrepancies {
    /// Manifest entries whose image file does not exist
    pub missing_files: Vec<KeyframeRecord>,
    /// Keyframe images on disk that the manifest does not list
    pub unlisted_files: Vec<String>,
}

impl ManifestDiscrepancies {
    pub fn is_consistent(&self) -> bool {
        self.missing_files.is_empty() && self.unlisted_files.is_empty()
    }
}

impl KeyframeManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, replacing any previous record for the same index
    pub fn insert(&mut self, record: KeyframeRecord) {
        self.records.insert(record.index, record);
    }

    pub fn get(&self, index: usize) -> Option<&KeyframeRecord> {
        self.records.get(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending index order
    pub fn records(&self) -> impl Iterator<Item = &KeyframeRecord> {
        self.records.values()
    }

    /// Persisted frame indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        self.records.keys().copied().collect()
    }

    /// Serializes the manifest to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a manifest from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Path of the manifest inside `dir`
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILENAME)
    }

    /// Writes the manifest atomically into `dir`, returning its path
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(dir);
        write_bytes_atomic(&path, self.to_json()?.as_bytes())?;
        Ok(path)
    }

    /// Reads the manifest stored in `dir`
    pub fn read_from_dir(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(Self::path_in(dir))?;
        Self::from_json(&json)
    }

    /// Compares the manifest with the keyframe images present in `dir`
    pub fn verify_against_dir(&self, dir: &Path) -> Result<ManifestDiscrepancies> {
        let missing_files = self
            .records()
            .filter(|r| !dir.join(&r.filename).is_file())
            .cloned()
            .collect();

        let listed: Vec<&str> = self.records().map(|r| r.filename.as_str()).collect();
        let mut unlisted_files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_keyframe_filename(&name) && !listed.contains(&name.as_str()) {
                unlisted_files.push(name);
            }
        }
        unlisted_files.sort();

        Ok(ManifestDiscrepancies {
            missing_files,
            unlisted_files,
        })
    }
}

impl FromIterator<KeyframeRecord> for KeyframeManifest {
    fn from_iter<I: IntoIterator<Item = KeyframeRecord>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for record in iter {
            manifest.insert(record);
        }
        manifest
    }
}
