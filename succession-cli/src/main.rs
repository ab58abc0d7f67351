//! Succession CLI Tool
//!
//! Command-line interface for segmenting video datasets into keyframes and
//! inspecting the resulting manifests.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use succession_core::{DiagnosticsSink, KeyframeManifest, NullSink, SegmentationConfig};
use succession_engine::{
    BatchReport, BatchRunner, CancellationToken, DirectoryDataset, RollingMedianBaseline,
    SegmentAnalyzer, VideoId, VideoLoad, VideoSource, VideoStatus,
};
use succession_render::GridRenderer;

#[derive(Parser)]
#[command(name = "succession")]
#[command(about = "Successor segmentation - split videos into segments and extract clear keyframes")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment every video of a dataset
    Run {
        /// Dataset root directory
        root: PathBuf,

        /// Only analyze these video identifiers (comma separated)
        #[arg(long, value_delimiter = ',')]
        videos: Vec<String>,

        /// Write the batch report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        options: AnalysisOptions,
    },

    /// Segment a single video of a dataset
    Analyze {
        /// Dataset root directory
        root: PathBuf,

        /// Video identifier
        id: String,

        #[command(flatten)]
        options: AnalysisOptions,
    },

    /// Show a keyframe manifest and check it against the files on disk
    Inspect {
        /// Output directory of one video
        dir: PathBuf,
    },
}

/// Settings shared by `run` and `analyze`; flags override the config file
#[derive(Args)]
struct AnalysisOptions {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output root (default: <root>/keyframe_outputs)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Deviation above the successor baseline that starts a segment
    #[arg(long)]
    successor_value: Option<f64>,

    /// Secondary deviation threshold
    #[arg(long)]
    phash_threshold: Option<f64>,

    /// Maximum segment duration in seconds
    #[arg(long)]
    max_duration: Option<u64>,

    /// Rolling-median window of the successor baseline
    #[arg(long)]
    window: Option<usize>,

    /// Number of videos analyzed in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Do not write keyframes_grid.png
    #[arg(long)]
    no_grid: bool,
}

impl AnalysisOptions {
    fn resolve_config(&self) -> Result<SegmentationConfig> {
        let mut config = match &self.config {
            Some(path) => SegmentationConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SegmentationConfig::default(),
        };

        if let Some(value) = self.successor_value {
            config.thresholds.successor_value = Some(value);
        }
        if let Some(value) = self.phash_threshold {
            config.thresholds.phash_threshold = Some(value);
        }
        if let Some(seconds) = self.max_duration {
            config.thresholds.max_duration = Some(seconds);
        }
        if let Some(window) = self.window {
            config.baseline_window = window;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if self.no_grid {
            config.render_grid = false;
        }

        config.validate().context("Invalid configuration")?;
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    fn dataset(&self, root: &Path, config: &SegmentationConfig) -> DirectoryDataset {
        let dataset = DirectoryDataset::new(root, config.layout.clone());
        match &self.output {
            Some(output) => dataset.with_output_root(output),
            None => dataset,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            root,
            videos,
            report,
            options,
        } => run_batch(root, videos, report, options)?,

        Commands::Analyze { root, id, options } => analyze_video(root, id, options)?,

        Commands::Inspect { dir } => inspect_manifest(dir)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();
}

fn build_analyzer(config: &SegmentationConfig) -> Result<SegmentAnalyzer> {
    let sink: Arc<dyn DiagnosticsSink> = if config.render_grid {
        Arc::new(GridRenderer::from_config(config).context("Invalid grid settings")?)
    } else {
        Arc::new(NullSink)
    };

    Ok(SegmentAnalyzer::new(config.quality)
        .with_estimator(Box::new(RollingMedianBaseline::new(config.baseline_window)))
        .with_sink(sink))
}

fn run_batch(
    root: PathBuf,
    videos: Vec<String>,
    report_path: Option<PathBuf>,
    options: AnalysisOptions,
) -> Result<()> {
    let config = options.resolve_config()?;
    let dataset = options.dataset(&root, &config);
    info!("Segmenting dataset {}", root.display());

    let runner = BatchRunner::new(build_analyzer(&config)?, config.thresholds).with_jobs(config.jobs);
    let selection: Vec<VideoId> = videos.into_iter().map(VideoId::new).collect();
    let report = runner
        .run(
            &dataset,
            (!selection.is_empty()).then_some(selection.as_slice()),
        )
        .context("Failed to run batch")?;

    print_report(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn analyze_video(root: PathBuf, id: String, options: AnalysisOptions) -> Result<()> {
    let config = options.resolve_config()?;
    let dataset = options.dataset(&root, &config);
    let id = VideoId::new(id);

    let input = match dataset
        .load(&id)
        .with_context(|| format!("Failed to load video {}", id))?
    {
        VideoLoad::Ready(input) => *input,
        VideoLoad::Skipped(reason) => bail!("Video {} cannot be analyzed: {}", id, reason),
    };
    let frame_count = input.frames.len().min(input.embeddings.len());

    let output_dir = dataset.output_dir(&id);
    let outcome = build_analyzer(&config)?
        .analyze_input(
            &id,
            input,
            &config.thresholds,
            None,
            &output_dir,
            &CancellationToken::new(),
        )
        .with_context(|| format!("Failed to analyze video {}", id))?;

    if let Some(reason) = &outcome.empty_reason {
        println!("Video {}: nothing written ({})", id, reason);
        return Ok(());
    }

    println!("\n=== Video {} ===", id);
    println!("Output: {}", output_dir.display());
    println!(
        "Keyframes: {} written, {} rejected",
        outcome.manifest.len(),
        outcome.rejected
    );
    if let Some(grid) = &outcome.grid_path {
        println!("Grid: {}", grid.display());
    }
    println!("Boundaries: {:?}", outcome.boundaries);
    for (i, segment) in outcome.segments(frame_count).iter().enumerate() {
        println!(
            "  Segment {}: frames {}..{} ({} frames)",
            i + 1,
            segment.start_frame,
            segment.end_frame,
            segment.frame_count()
        );
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("\n=== Batch Report ===");
    for video in &report.videos {
        let status = match &video.status {
            VideoStatus::Analyzed {
                boundaries,
                keyframes,
            } => format!("analyzed: {} boundaries, {} keyframes", boundaries, keyframes),
            VideoStatus::Empty { reason } => format!("empty: {}", reason),
            VideoStatus::Skipped { reason } => format!("skipped: {}", reason),
            VideoStatus::Failed { error } => format!("FAILED: {}", error),
            VideoStatus::Cancelled => "cancelled".to_string(),
        };
        println!(
            "  {:<12} {:>8.2}s  {}",
            video.id.as_str(),
            video.elapsed_secs,
            status
        );
    }
    println!(
        "\nAnalyzed: {}  Empty: {}  Skipped: {}  Failed: {}  Cancelled: {}",
        report.analyzed(),
        report.empty(),
        report.skipped(),
        report.failed(),
        report.cancelled()
    );
    println!("Keyframes written: {}", report.keyframes());
    print!("Elapsed: {:.1}s", report.elapsed_secs);
    match report.slowest() {
        Some(slowest) => println!(
            " (slowest: {} in {:.2}s)",
            slowest.id.as_str(),
            slowest.elapsed_secs
        ),
        None => println!(),
    }
}

fn inspect_manifest(dir: PathBuf) -> Result<()> {
    let manifest = KeyframeManifest::read_from_dir(&dir)
        .with_context(|| format!("Failed to read manifest in {}", dir.display()))?;

    println!("\n=== Keyframe Manifest ===");
    println!("Directory: {}", dir.display());
    println!("Keyframes: {}", manifest.len());
    for record in manifest.records().take(20) {
        println!(
            "  [{}] {:>9.2}s  {}",
            record.index, record.timestamp, record.filename
        );
    }
    if manifest.len() > 20 {
        println!("  ... and {} more keyframes", manifest.len() - 20);
    }

    let discrepancies = manifest
        .verify_against_dir(&dir)
        .context("Failed to verify manifest")?;
    if discrepancies.is_consistent() {
        println!("\nManifest matches the files on disk");
        return Ok(());
    }

    for record in &discrepancies.missing_files {
        println!("  missing file: {} (index {})", record.filename, record.index);
    }
    for name in &discrepancies.unlisted_files {
        println!("  not in manifest: {}", name);
    }
    bail!(
        "{} listed keyframes missing, {} keyframe files not listed",
        discrepancies.missing_files.len(),
        discrepancies.unlisted_files.len()
    )
}
