//! Night scene detection and black-frame splitting driven by ffmpeg
//!
//! ffmpeg does all decoding and pixel statistics. This crate builds the
//! filter graphs, parses what ffmpeg reports, groups dark frames into scenes,
//! and cuts the results back out with ffmpeg.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use night_scenes::{detect_night_scenes, DetectionConfig, FfmpegAnalyzer, FfmpegExtractor};
//!
//! let mut config = DetectionConfig::new("movie.mp4");
//! config.luma_threshold = 25;
//!
//! let analyzer = FfmpegAnalyzer::new()?;
//! let summary = detect_night_scenes(&analyzer, &FfmpegExtractor, &config)?;
//! for scene in &summary.scenes {
//!     println!("Night scene: {}", scene);
//! }
//! # Ok::<(), night_scenes::NightScanError>(())
//! ```
//!
//! The grouping step is also usable on its own:
//!
//! ```rust
//! let scenes = night_scenes::segment(&[0.0, 0.5, 1.0, 1.5], 1.0, 2.0)?;
//! assert_eq!(scenes.len(), 1);
//! # Ok::<(), night_scenes::NightScanError>(())
//! ```

mod analysis;
mod black_split;
mod common;
mod config;
mod extract;
mod ffmpeg;
mod report;
mod segmenter;

// Re-export main types for public API
pub use analysis::{observations, BlackInterval, FramePredicate, FrameSample, LogParser};
pub use black_split::content_segments;
pub use common::{Interval, NightScanError, Result, SceneList};
pub use config::{BlackSplitConfig, DetectionConfig, ExtractionPlan};
pub use extract::{extract_scenes, tally, ExtractionOutcome, ExtractionRequest};
pub use ffmpeg::{
    parse_frame_rate, BlackDetectSettings, FfmpegAnalyzer, FfmpegExtractor, FrameAnalyzer,
    SegmentExtractor, VideoInfo,
};
pub use report::{DetectionReport, SceneEntry, REPORT_FILE_NAME};
pub use segmenter::{segment, SceneSegmenter, DEFAULT_GAP_TOLERANCE_FACTOR};

use std::fs;
use std::path::PathBuf;

use tracing::{info, instrument, warn};

/// What a night detection run found and produced
#[derive(Debug)]
pub struct DetectionSummary {
    pub video: VideoInfo,
    pub frames_analyzed: usize,
    pub dark_frames: usize,
    pub scenes: SceneList,
    pub outcomes: Vec<ExtractionOutcome>,
    pub report: DetectionReport,
    pub report_path: PathBuf,
}

impl DetectionSummary {
    /// Number of scenes whose extraction failed
    pub fn failed_extractions(&self) -> usize {
        tally(&self.outcomes).1
    }
}

/// Detect night scenes in `config.input` and extract them
///
/// Steps: probe the video, analyze every frame, keep the frames matching the
/// brightness (and optional scene-change) predicate, group them into scenes,
/// extract clips/frames per the plan, and write the text report.
///
/// Finding nothing is not an error: the summary simply has no scenes.
///
/// # Errors
/// * `InvalidConfig` - If the configuration does not validate
/// * `VideoNotFound` - If the input does not exist
/// * `ToolNotFound` / `ToolFailed` - If probing or analysis fails
///
/// Extraction failures are reported per scene in `outcomes`, not here.
#[instrument(skip(analyzer, extractor, config), fields(input = %config.input.display()))]
pub fn detect_night_scenes<A, E>(analyzer: &A, extractor: &E, config: &DetectionConfig) -> Result<DetectionSummary>
where
    A: FrameAnalyzer + ?Sized,
    E: SegmentExtractor + ?Sized,
{
    config.validate()?;
    let segmenter = config.segmenter()?;

    info!("Starting night scene detection for: {}", config.input.display());
    info!(
        "Luminance threshold: {}, Minimum duration: {}s",
        config.luma_threshold, config.min_duration
    );
    info!("Will extract: {}", config.plan.describe());

    fs::create_dir_all(&config.output_dir)?;

    let video = analyzer.video_info(&config.input)?;

    let predicate = FramePredicate {
        luma_threshold: config.luma_threshold,
        scene_threshold: config.scene_threshold,
    };
    let samples = analyzer.frame_samples(&config.input, predicate.needs_scene_scores())?;
    let dark = observations(&samples, &predicate);
    info!("Found {} dark frames (luma < {})", dark.len(), config.luma_threshold);

    let scenes = if dark.is_empty() {
        warn!("No dark frames found. Try increasing --luma threshold.");
        Vec::new()
    } else {
        let scenes = segmenter.segment(&dark)?;
        info!("Created {} night scenes", scenes.len());
        if scenes.is_empty() {
            warn!("No scenes meet minimum duration requirement.");
        }
        scenes
    };

    let stem = config.input_stem();
    let request = ExtractionRequest {
        source: &config.input,
        output_dir: &config.output_dir,
        stem: &stem,
        prefix: "night_scene",
        container: &config.container,
        quality: config.quality,
        frame_interval: config.frame_interval,
        plan: config.plan,
    };
    let outcomes = extract_scenes(extractor, &scenes, &request);
    let (ok, failed) = tally(&outcomes);
    if failed > 0 {
        warn!("{} of {} scene extractions failed", failed, ok + failed);
    }

    let report = DetectionReport::new(
        &config.input,
        config.luma_threshold,
        config.scene_threshold,
        config.min_duration,
        dark.len(),
        &scenes,
    );
    let report_path = report.write_text(&config.output_dir)?;

    info!("Night scene detection completed");
    info!("Output directory: {}", config.output_dir.display());

    Ok(DetectionSummary {
        video,
        frames_analyzed: samples.len(),
        dark_frames: dark.len(),
        scenes,
        outcomes,
        report,
        report_path,
    })
}

/// What a black-frame split run found and produced
#[derive(Debug)]
pub struct BlackSplitSummary {
    pub video: VideoInfo,
    pub black: Vec<BlackInterval>,
    pub segments: Vec<Interval>,
    pub outcomes: Vec<ExtractionOutcome>,
}

/// Split `config.input` into content segments at black-frame transitions
///
/// # Errors
/// * `InvalidConfig` - If the configuration does not validate
/// * `InvalidInput` - If the video reports no usable duration
/// * `VideoNotFound` / `ToolNotFound` / `ToolFailed` - As for analysis
#[instrument(skip(analyzer, extractor, config), fields(input = %config.input.display()))]
pub fn split_on_black_frames<A, E>(analyzer: &A, extractor: &E, config: &BlackSplitConfig) -> Result<BlackSplitSummary>
where
    A: FrameAnalyzer + ?Sized,
    E: SegmentExtractor + ?Sized,
{
    config.validate()?;
    info!("Splitting {} at black frames", config.input.display());
    fs::create_dir_all(&config.output_dir)?;

    let video = analyzer.video_info(&config.input)?;
    let settings = BlackDetectSettings {
        min_duration: config.min_black_duration,
        pixel_threshold: config.pixel_threshold,
        picture_threshold: config.picture_threshold,
    };
    let black = analyzer.black_intervals(&config.input, &settings)?;
    info!("Found {} black intervals", black.len());

    let segments = content_segments(&black, video.duration_seconds, config.min_segment_duration)?;
    info!("Created {} segments", segments.len());

    let stem = config.input_stem();
    let request = ExtractionRequest {
        source: &config.input,
        output_dir: &config.output_dir,
        stem: &stem,
        prefix: "segment",
        container: &config.container,
        quality: config.quality,
        frame_interval: 1.0,
        plan: ExtractionPlan {
            videos: true,
            frames: false,
        },
    };
    let outcomes = extract_scenes(extractor, &segments, &request);

    Ok(BlackSplitSummary {
        video,
        black,
        segments,
        outcomes,
    })
}

/// Initialize tracing for the library
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
/// * `level` - Tracing level filter (e.g., "debug", "info", "warn", "error")
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
