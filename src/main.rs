//! Command-line interface for night scene detection
//!
//! `detect` finds dark stretches and extracts frames and/or clips,
//! `split-black` cuts a video at black-frame transitions, and `info` prints
//! what ffprobe reports about a file.

use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};

use night_scenes::{
    detect_night_scenes, init_tracing, split_on_black_frames, BlackSplitConfig, DetectionConfig,
    DetectionSummary, ExtractionPlan, FfmpegAnalyzer, FfmpegExtractor, FrameAnalyzer,
};

#[derive(Parser, Debug)]
#[command(name = "night-scenes")]
#[command(about = "Detect night scenes and split videos at black frames using ffmpeg")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect night scenes by brightness and extract frames or clips
    Detect(DetectArgs),
    /// Split a video into segments at black-frame transitions
    SplitBlack(SplitArgs),
    /// Show video information only
    Info {
        /// Input video file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct DetectArgs {
    /// Input video file
    #[arg(short, long)]
    file: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./night_scenes")]
    out: PathBuf,

    /// Luminance threshold (0-255); darker frames count as night
    #[arg(short, long, default_value_t = 30)]
    luma: u8,

    /// Minimum scene duration in seconds
    #[arg(short, long, default_value_t = 1.0)]
    duration: f64,

    /// Largest gap between dark frames, as a multiple of --duration
    #[arg(long, default_value_t = 2.0)]
    gap_factor: f64,

    /// Also require a scene-change score above this value (0-1)
    #[arg(long)]
    scene_threshold: Option<f64>,

    /// Extract video segments
    #[arg(short = 'v', long)]
    extract_videos: bool,

    /// Skip frame extraction
    #[arg(long)]
    no_frames: bool,

    /// Seconds between extracted frames
    #[arg(short, long, default_value_t = 1.0)]
    interval: f64,

    /// Video quality (x264 CRF)
    #[arg(short, long, default_value_t = 2)]
    quality: u8,

    /// Output container format
    #[arg(long, default_value = "mp4")]
    format: String,

    /// Do not keep the raw ffmpeg analysis log
    #[arg(long)]
    discard_log: bool,

    /// How to print results
    #[arg(long, value_enum, default_value_t = OutputFormat::Simple)]
    output_format: OutputFormat,
}

#[derive(clap::Args, Debug)]
struct SplitArgs {
    /// Input video file
    #[arg(short, long)]
    file: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./segments")]
    out: PathBuf,

    /// Shortest black run in seconds that counts as a transition
    #[arg(long, default_value_t = 0.5)]
    black_duration: f64,

    /// Pixel blackness threshold (0-1)
    #[arg(long, default_value_t = 0.10)]
    pixel_threshold: f64,

    /// Ratio of black pixels for a black picture (0-1)
    #[arg(long, default_value_t = 0.98)]
    picture_threshold: f64,

    /// Segments shorter than this many seconds are skipped
    #[arg(long, default_value_t = 1.0)]
    min_segment: f64,

    /// Video quality (x264 CRF)
    #[arg(short, long, default_value_t = 18)]
    quality: u8,

    /// Output container format
    #[arg(long, default_value = "mp4")]
    format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One line per scene
    Simple,
    /// Scenes with timing and extraction results
    Detailed,
    /// JSON for integration
    Json,
}

impl DetectArgs {
    fn to_config(&self) -> DetectionConfig {
        DetectionConfig {
            output_dir: self.out.clone(),
            luma_threshold: self.luma,
            min_duration: self.duration,
            gap_tolerance_factor: self.gap_factor,
            scene_threshold: self.scene_threshold,
            plan: ExtractionPlan {
                videos: self.extract_videos,
                frames: !self.no_frames,
            },
            frame_interval: self.interval,
            quality: self.quality,
            container: self.format.clone(),
            keep_analysis_log: !self.discard_log,
            ..DetectionConfig::new(&self.file)
        }
    }
}

impl SplitArgs {
    fn to_config(&self) -> BlackSplitConfig {
        BlackSplitConfig {
            output_dir: self.out.clone(),
            min_black_duration: self.black_duration,
            pixel_threshold: self.pixel_threshold,
            picture_threshold: self.picture_threshold,
            min_segment_duration: self.min_segment,
            quality: self.quality,
            container: self.format.clone(),
            ..BlackSplitConfig::new(&self.file)
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    init_tracing(log_level);

    info!("Night Scenes CLI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", cli);

    let analyzer = FfmpegAnalyzer::new().context("Failed to set up ffmpeg analyzer")?;

    match cli.command {
        Commands::Detect(args) => run_detect(analyzer, &args),
        Commands::SplitBlack(args) => run_split(&analyzer, &args),
        Commands::Info { file } => show_video_info(&analyzer, &file),
    }
}

fn run_detect(analyzer: FfmpegAnalyzer, args: &DetectArgs) -> Result<()> {
    let config = args.to_config();
    config.validate().context("Invalid arguments")?;

    let analyzer = analyzer.with_log_path(config.analysis_log_path());
    let start_time = Instant::now();

    let summary = detect_night_scenes(&analyzer, &FfmpegExtractor, &config)
        .with_context(|| format!("Night scene detection failed for {}", config.input.display()))?;

    output_results(&summary, &config, args.output_format, start_time.elapsed())
}

fn run_split(analyzer: &FfmpegAnalyzer, args: &SplitArgs) -> Result<()> {
    let config = args.to_config();
    let summary = split_on_black_frames(analyzer, &FfmpegExtractor, &config)
        .with_context(|| format!("Black-frame split failed for {}", config.input.display()))?;

    println!(
        "Found {} black intervals, wrote {} segments to {}",
        summary.black.len(),
        summary.segments.len(),
        config.output_dir.display()
    );
    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(_) => println!("  Segment {}: {}", outcome.index, outcome.interval),
            Err(e) => println!("  Segment {}: {} FAILED ({})", outcome.index, outcome.interval, e),
        }
    }
    Ok(())
}

fn show_video_info(analyzer: &FfmpegAnalyzer, file: &Path) -> Result<()> {
    info!("Analyzing video: {}", file.display());

    let video_info = analyzer
        .video_info(file)
        .context("Failed to get video info")?;

    println!("Video Information:");
    println!("  Path: {}", video_info.path);
    println!("  Frame Rate: {:.2} fps", video_info.fps);
    println!("  Duration: {:.2} seconds", video_info.duration_seconds);

    if !video_info.is_valid() {
        warn!("Video properties appear invalid - detection may fail");
    }

    Ok(())
}

fn output_results(
    summary: &DetectionSummary,
    config: &DetectionConfig,
    format: OutputFormat,
    detection_time: Duration,
) -> Result<()> {
    match format {
        OutputFormat::Simple => {
            for scene in &summary.scenes {
                println!("{:.3} {:.3}", scene.start, scene.end);
            }
        }
        OutputFormat::Detailed => {
            println!("Night Scene Detection Results:");
            println!("  Detection time: {}ms", detection_time.as_millis());
            println!("  Video: {}", summary.video.description());
            println!("  Frames analyzed: {}", summary.frames_analyzed);
            println!("  Dark frames: {}", summary.dark_frames);
            println!("  Scenes found: {}", summary.scenes.len());

            if summary.scenes.is_empty() {
                println!("  No night scenes detected");
            }
            for outcome in &summary.outcomes {
                let status = match &outcome.result {
                    Ok(paths) => format!("{} outputs", paths.len()),
                    Err(e) => format!("FAILED ({})", e),
                };
                println!("    Scene {}: {} - {}", outcome.index, outcome.interval, status);
            }
            println!("  Report: {}", summary.report_path.display());
        }
        OutputFormat::Json => {
            let json_output = serde_json::json!({
                "detection_time_ms": detection_time.as_millis() as u64,
                "video": summary.video,
                "frames_analyzed": summary.frames_analyzed,
                "report": summary.report,
                "failed_extractions": summary.failed_extractions(),
                "config": config,
            });

            println!(
                "{}",
                serde_json::to_string_pretty(&json_output).context("JSON serialization failed")?
            );
        }
    }

    info!(
        "Detection completed in {}ms, found {} night scenes",
        detection_time.as_millis(),
        summary.scenes.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_detect_defaults() {
        let cli = Cli::try_parse_from(["night-scenes", "detect", "-f", "film.mp4"]).unwrap();
        let Commands::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        let config = args.to_config();

        assert_eq!(config, DetectionConfig::new("film.mp4"));
        assert_eq!(args.output_format, OutputFormat::Simple);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_detect_flags() {
        let cli = Cli::try_parse_from([
            "night-scenes", "--verbose", "detect", "-f", "film.mp4", "-o", "/tmp/out", "-l", "20",
            "-d", "2.5", "--gap-factor", "1.5", "--scene-threshold", "0.3", "-v", "--no-frames",
            "-q", "23", "--format", "mkv", "--output-format", "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        let config = args.to_config();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.luma_threshold, 20);
        assert_eq!(config.min_duration, 2.5);
        assert_eq!(config.gap_tolerance_factor, 1.5);
        assert_eq!(config.scene_threshold, Some(0.3));
        assert_eq!(config.plan, ExtractionPlan { videos: true, frames: false });
        assert_eq!(config.quality, 23);
        assert_eq!(config.container, "mkv");
        assert_eq!(args.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_luma_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["night-scenes", "detect", "-f", "a.mp4", "-l", "300"]).is_err());
    }

    #[test]
    fn test_split_flags() {
        let cli = Cli::try_parse_from([
            "night-scenes", "split-black", "-f", "show.mp4", "--black-duration", "1.0", "--min-segment", "5",
        ])
        .unwrap();
        let Commands::SplitBlack(args) = cli.command else {
            panic!("expected split-black");
        };
        let config = args.to_config();

        assert_eq!(config.min_black_duration, 1.0);
        assert_eq!(config.min_segment_duration, 5.0);
        assert_eq!(config.output_dir, PathBuf::from("./segments"));
        assert!(config.validate().is_ok());
    }
}
