use byteorder::{BigEndian, WriteBytesExt};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use succession_core::npy::encode_npy_f32;
use succession_core::{
    DatasetLayout, KeyframeManifest, QualityBounds, ThresholdConfig, MANIFEST_FILENAME,
};
use succession_engine::*;
use tempfile::tempdir;

// --- Test Helper Functions ---

/// Writes one video of the synthetic dataset: gray frames named `frame_<i>.png`,
/// one-second timestamps, a raw video stub and the embeddings as `<id>.npy`
fn write_video(root: &Path, id: &str, embeddings: &[Vec<f32>], intensities: &[u8]) {
    let layout = DatasetLayout::default();
    let frames_dir = root.join(&layout.frames_dir).join(id);
    fs::create_dir_all(&frames_dir).unwrap();
    for (i, &value) in intensities.iter().enumerate() {
        RgbImage::from_pixel(8, 8, Rgb([value, value, value]))
            .save(frames_dir.join(format!("frame_{i}.png")))
            .unwrap();
    }
    let timestamps: Vec<f64> = (0..intensities.len()).map(|i| i as f64).collect();
    fs::write(
        frames_dir.join(&layout.timestamps_file),
        serde_json::to_string(&timestamps).unwrap(),
    )
    .unwrap();

    let embeddings_dir = root.join(&layout.embeddings_dir);
    fs::create_dir_all(&embeddings_dir).unwrap();
    fs::write(embeddings_dir.join(format!("{id}.npy")), encode_npy_f32(embeddings)).unwrap();

    let videos_dir = root.join(&layout.videos_dir);
    fs::create_dir_all(&videos_dir).unwrap();
    fs::write(videos_dir.join(format!("{id}.mp4")), b"not a real video").unwrap();
}

/// Big-endian f8 `.npy` file, as written by some exporters
fn encode_npy_f64_be(rows: &[Vec<f64>]) -> Vec<u8> {
    let dimension = rows.first().map_or(0, Vec::len);
    let mut dict = format!(
        "{{'descr': '>f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows.len(),
        dimension
    );
    let unpadded = 10 + dict.len() + 1;
    dict.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    dict.push('\n');

    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    for value in rows.iter().flatten() {
        out.write_f64::<BigEndian>(*value).unwrap();
    }
    out
}

/// Little-endian f4 `.npy` header declaring `shape` followed by `data`
fn encode_npy_header(shape: &str, data: &[u8]) -> Vec<u8> {
    let mut dict = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape}, }}");
    let unpadded = 10 + dict.len() + 1;
    dict.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    dict.push('\n');

    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend_from_slice(data);
    out
}

fn write_frame(root: &Path, id: &str, index: usize, value: u8) {
    let frames_dir = root.join(DatasetLayout::default().frames_dir).join(id);
    RgbImage::from_pixel(8, 8, Rgb([value, value, value]))
        .save(frames_dir.join(format!("frame_{index}.png")))
        .unwrap();
}

fn step_at(len: usize, step: usize) -> Vec<Vec<f32>> {
    (0..len)
        .map(|i| if i < step { vec![0.0, 0.0] } else { vec![10.0, 10.0] })
        .collect()
}

fn low_threshold() -> ThresholdConfig {
    ThresholdConfig {
        successor_value: Some(1.0),
        ..ThresholdConfig::default()
    }
}

fn runner() -> BatchRunner {
    BatchRunner::new(SegmentAnalyzer::new(QualityBounds::default()), low_threshold())
}

// --- Tests ---

#[test]
fn test_batch_writes_keyframes_and_manifest() {
    let dir = tempdir().unwrap();
    write_video(dir.path(), "1", &step_at(4, 2), &[128, 128, 128, 128]);

    let dataset = DirectoryDataset::new(dir.path(), DatasetLayout::default());
    let report = runner().run(&dataset, None).unwrap();

    assert_eq!(
        report.status_of(&VideoId::from("1")),
        Some(&VideoStatus::Analyzed {
            boundaries: 2,
            keyframes: 4
        })
    );

    let out = dir.path().join("keyframe_outputs").join("1");
    let manifest = KeyframeManifest::read_from_dir(&out).unwrap();
    assert_eq!(manifest.indices(), vec![0, 1, 2, 3]);
    assert_eq!(
        manifest.get(2).unwrap().filename,
        "keyframe_2_timestamp_2.00.png"
    );
    assert!(manifest.verify_against_dir(&out).unwrap().is_consistent());
}

#[test]
fn test_manifest_lists_exactly_the_written_images() {
    let dir = tempdir().unwrap();
    write_video(dir.path(), "1", &step_at(6, 3), &[128, 0, 128, 255, 60, 200]);

    let dataset = DirectoryDataset::new(dir.path(), DatasetLayout::default());
    runner().run(&dataset, None).unwrap();

    let out = dir.path().join("keyframe_outputs").join("1");
    let manifest = KeyframeManifest::read_from_dir(&out).unwrap();
    let mut written: Vec<usize> = fs::read_dir(&out)
        .unwrap()
        .filter_map(|entry| {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            name.strip_prefix("keyframe_")
                .and_then(|rest| rest.split('_').next())
                .and_then(|index| index.parse().ok())
        })
        .collect();
    written.sort_unstable();

    assert_eq!(manifest.indices(), vec![0, 2, 4, 5]);
    assert_eq!(written, manifest.indices());
}

#[test]
fn test_duration_cap_splits_long_segment() {
    let dir = tempdir().unwrap();
    write_video(dir.path(), "1", &step_at(6, 5), &[128; 6]);

    let dataset = DirectoryDataset::new(dir.path(), DatasetLayout::default());
    let input = match dataset.load(&VideoId::from("1")).unwrap() {
        VideoLoad::Ready(input) => *input,
        VideoLoad::Skipped(reason) => panic!("unexpected skip: {reason}"),
    };
    let out = dir.path().join("out");

    let outcome = SegmentAnalyzer::default()
        .analyze_input(
            &VideoId::from("1"),
            input,
            &low_threshold(),
            Some(2),
            &out,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(outcome.boundaries, vec![0, 2, 5]);
}

#[test]
fn test_single_frame_video_writes_nothing() {
    let dir = tempdir().unwrap();
    write_video(dir.path(), "1", &step_at(1, 0), &[128]);

    let dataset = DirectoryDataset::new(dir.path(), DatasetLayout::default());
    let report = runner().run(&dataset, None).unwrap();

    assert_eq!(report.empty(), 1);
    assert!(!dir.path().join("keyframe_outputs").join("1").exists());
}

#[test]
fn test_skips_and_failures_do_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_video(root, "1", &step_at(4, 2), &[128; 4]);
    write_video(root, "2", &step_at(4, 2), &[128; 4]);
    write_video(root, "3", &step_at(4, 2), &[128; 4]);
    write_video(root, "4", &step_at(4, 2), &[128; 4]);
    write_video(root, "5", &step_at(4, 2), &[128; 4]);
    fs::remove_file(root.join("keyframeembeddings/2.npy")).unwrap();
    fs::write(root.join("keyframeembeddings/3.npy"), b"truncated").unwrap();
    fs::remove_file(root.join("originalvideos/4.mp4")).unwrap();
    fs::write(root.join("keyframes/5/timestamps.json"), "[0.0, 3.0, 2.0, 4.0]").unwrap();

    let dataset = DirectoryDataset::new(root, DatasetLayout::default());
    let report = runner().with_jobs(2).run(&dataset, None).unwrap();

    assert_eq!(report.videos.len(), 5);
    assert_eq!(report.analyzed(), 1);
    assert_eq!(
        report.status_of(&VideoId::from("2")),
        Some(&VideoStatus::Skipped {
            reason: SkipReason::MissingEmbeddings
        })
    );
    assert_eq!(
        report.status_of(&VideoId::from("3")),
        Some(&VideoStatus::Skipped {
            reason: SkipReason::UnloadableEmbeddings
        })
    );
    assert_eq!(
        report.status_of(&VideoId::from("4")),
        Some(&VideoStatus::Skipped {
            reason: SkipReason::MissingVideo
        })
    );
    assert!(matches!(
        report.status_of(&VideoId::from("5")),
        Some(VideoStatus::Failed { .. })
    ));
}

#[test]
fn test_mixed_width_shards_are_a_recoverable_skip() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_video(root, "1", &step_at(3, 1), &[128; 3]);
    let emb = root.join("keyframeembeddings");
    fs::remove_file(emb.join("1.npy")).unwrap();
    fs::create_dir_all(emb.join("1")).unwrap();
    fs::write(emb.join("1/a.npy"), encode_npy_f32(&[vec![0.0, 0.0]])).unwrap();
    fs::write(
        emb.join("1/b.npy"),
        encode_npy_f64_be(&[vec![1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0]]),
    )
    .unwrap();

    let dataset = DirectoryDataset::new(root, DatasetLayout::default());
    let report = runner().run(&dataset, None).unwrap();

    assert!(matches!(
        report.status_of(&VideoId::from("1")),
        Some(VideoStatus::Empty { .. })
    ));
    assert!(!root.join("keyframe_outputs/1").join(MANIFEST_FILENAME).exists());
}

#[test]
fn test_big_endian_shards_are_concatenated() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_video(root, "1", &step_at(4, 2), &[128; 4]);
    let emb = root.join("keyframeembeddings");
    fs::remove_file(emb.join("1.npy")).unwrap();
    fs::create_dir_all(emb.join("1")).unwrap();
    fs::write(
        emb.join("1/000.npy"),
        encode_npy_f64_be(&[vec![0.0, 0.0], vec![0.0, 0.0]]),
    )
    .unwrap();
    fs::write(
        emb.join("1/001.npy"),
        encode_npy_f64_be(&[vec![10.0, 10.0], vec![10.0, 10.0]]),
    )
    .unwrap();

    let dataset = DirectoryDataset::new(root, DatasetLayout::default())
        .with_output_root(root.join("elsewhere"));
    let report = runner().run(&dataset, Some(&[VideoId::from("1")][..])).unwrap();

    assert_eq!(
        report.status_of(&VideoId::from("1")),
        Some(&VideoStatus::Analyzed {
            boundaries: 2,
            keyframes: 4
        })
    );
    assert!(root.join("elsewhere/1").join(MANIFEST_FILENAME).is_file());
}

#[test]
fn test_oversized_embedding_shape_skips_only_that_video() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_video(root, "1", &step_at(4, 2), &[128; 4]);
    write_video(root, "2", &step_at(4, 2), &[128; 4]);
    fs::write(
        root.join("keyframeembeddings/1.npy"),
        encode_npy_header("(100000000000, 512)", &[0u8; 16]),
    )
    .unwrap();

    let dataset = DirectoryDataset::new(root, DatasetLayout::default());
    let report = runner().run(&dataset, None).unwrap();

    assert_eq!(
        report.status_of(&VideoId::from("1")),
        Some(&VideoStatus::Skipped {
            reason: SkipReason::UnloadableEmbeddings
        })
    );
    assert_eq!(
        report.status_of(&VideoId::from("2")),
        Some(&VideoStatus::Analyzed {
            boundaries: 2,
            keyframes: 4
        })
    );
}

#[test]
fn test_rerun_leaves_no_stale_keyframes() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_video(root, "1", &step_at(4, 2), &[128; 4]);
    let dataset = DirectoryDataset::new(root, DatasetLayout::default());
    let out = root.join("keyframe_outputs/1");

    runner().run(&dataset, None).unwrap();
    assert!(out.join("keyframe_3_timestamp_3.00.png").is_file());

    // frame 3 turns black, so the second run rejects it
    write_frame(root, "1", 3, 0);
    let report = runner().run(&dataset, None).unwrap();

    assert_eq!(
        report.status_of(&VideoId::from("1")),
        Some(&VideoStatus::Analyzed {
            boundaries: 2,
            keyframes: 3
        })
    );
    assert!(!out.join("keyframe_3_timestamp_3.00.png").exists());
    let manifest = KeyframeManifest::read_from_dir(&out).unwrap();
    assert_eq!(manifest.indices(), vec![0, 1, 2]);
    assert!(manifest.verify_against_dir(&out).unwrap().is_consistent());
}
