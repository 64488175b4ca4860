//! ffmpeg and ffprobe process wrappers
//!
//! All decoding and pixel statistics happen inside the external tools. This
//! module builds their command lines, runs them, and hands the text output to
//! [`crate::analysis::LogParser`]. The two capability traits let the pipeline
//! be exercised without any binaries installed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::analysis::{BlackInterval, FrameSample, LogParser};
use crate::common::{Interval, NightScanError, Result};

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Basic properties of an input video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub path: String,
    pub duration_seconds: f64,
    pub fps: f64,
}

impl VideoInfo {
    /// Get a human-readable description of the video
    pub fn description(&self) -> String {
        format!("{:.1}s at {:.2}fps", self.duration_seconds, self.fps)
    }

    /// Check if this appears to be a valid video
    pub fn is_valid(&self) -> bool {
        self.duration_seconds > 0.0 && self.fps > 0.0
    }
}

/// blackdetect filter settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackDetectSettings {
    pub min_duration: f64,
    pub pixel_threshold: f64,
    pub picture_threshold: f64,
}

impl BlackDetectSettings {
    pub fn filter(&self) -> String {
        format!(
            "blackdetect=d={}:pix_th={:.2}:pic_th={:.2}",
            self.min_duration, self.pixel_threshold, self.picture_threshold
        )
    }
}

/// Produces per-frame analysis data for a video
pub trait FrameAnalyzer {
    fn video_info(&self, source: &Path) -> Result<VideoInfo>;

    /// Per-frame luma statistics, with scene scores when `scene_scores` is set
    fn frame_samples(&self, source: &Path, scene_scores: bool) -> Result<Vec<FrameSample>>;

    fn black_intervals(&self, source: &Path, settings: &BlackDetectSettings) -> Result<Vec<BlackInterval>>;
}

/// Cuts clips and still frames out of a video
pub trait SegmentExtractor {
    /// Write the span `interval` of `source` to `output`
    fn extract_clip(&self, source: &Path, interval: &Interval, output: &Path, quality: u8) -> Result<()>;

    /// Write one JPEG every `frame_interval` seconds of `interval`
    ///
    /// `pattern` is an ffmpeg image sequence path such as `scene_%04d.jpg`.
    fn extract_frames(&self, source: &Path, interval: &Interval, pattern: &Path, frame_interval: f64) -> Result<()>;
}

/// [`FrameAnalyzer`] backed by the ffmpeg and ffprobe binaries
#[derive(Debug)]
pub struct FfmpegAnalyzer {
    parser: LogParser,
    log_path: Option<PathBuf>,
}

impl FfmpegAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: LogParser::new()?,
            log_path: None,
        })
    }

    /// Also write the raw analysis output to `path`
    pub fn with_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.log_path = path;
        self
    }

    /// Filter graph used for frame analysis
    pub fn analysis_filter(scene_scores: bool) -> &'static str {
        if scene_scores {
            "select='gte(scene,0)',metadata=print,showinfo"
        } else {
            "showinfo"
        }
    }

    fn persist_log(&self, log: &str) -> Result<()> {
        if let Some(path) = &self.log_path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, log)?;
            info!("Analysis output saved to {}", path.display());
        }
        Ok(())
    }
}

impl FrameAnalyzer for FfmpegAnalyzer {
    #[instrument(skip(self))]
    fn video_info(&self, source: &Path) -> Result<VideoInfo> {
        ensure_exists(source)?;

        let output = run(probe_command(source, "format=duration"), FFPROBE)?;
        let duration_seconds = parse_duration(&String::from_utf8_lossy(&output.stdout));

        let output = run(probe_command(source, "stream=r_frame_rate"), FFPROBE)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let fps = parse_frame_rate(stdout.lines().next().unwrap_or_default());

        let info = VideoInfo {
            path: source.display().to_string(),
            duration_seconds,
            fps,
        };
        info!("Video duration: {:.1}s, FPS: {:.2}", info.duration_seconds, info.fps);
        if !info.is_valid() {
            warn!("ffprobe reported unusual properties for {}", info.path);
        }
        Ok(info)
    }

    #[instrument(skip(self))]
    fn frame_samples(&self, source: &Path, scene_scores: bool) -> Result<Vec<FrameSample>> {
        ensure_exists(source)?;
        info!("Analyzing video brightness...");

        let mut cmd = Command::new(FFMPEG);
        cmd.arg("-hide_banner")
            .arg("-nostdin")
            .arg("-i")
            .arg(source)
            .args(["-vf", Self::analysis_filter(scene_scores), "-an", "-f", "null", "-"]);

        let output = run(cmd, FFMPEG)?;
        let log = String::from_utf8_lossy(&output.stderr);
        self.persist_log(&log)?;

        let samples = self.parser.frame_samples(&log);
        if samples.is_empty() {
            warn!("ffmpeg produced no showinfo frames for {}", source.display());
        }
        Ok(samples)
    }

    #[instrument(skip(self))]
    fn black_intervals(&self, source: &Path, settings: &BlackDetectSettings) -> Result<Vec<BlackInterval>> {
        ensure_exists(source)?;
        info!("Detecting black frames...");

        let filter = settings.filter();
        let mut cmd = Command::new(FFMPEG);
        cmd.arg("-hide_banner")
            .arg("-nostdin")
            .arg("-i")
            .arg(source)
            .args(["-vf", filter.as_str(), "-an", "-f", "null", "-"]);

        let output = run(cmd, FFMPEG)?;
        let log = String::from_utf8_lossy(&output.stderr);
        self.persist_log(&log)?;

        Ok(self.parser.black_intervals(&log))
    }
}

/// [`SegmentExtractor`] backed by the ffmpeg binary
#[derive(Debug, Default)]
pub struct FfmpegExtractor;

impl FfmpegExtractor {
    fn base_command(source: &Path, interval: &Interval) -> Command {
        let mut cmd = Command::new(FFMPEG);
        cmd.args(["-y", "-nostdin", "-loglevel", "warning"])
            .arg("-ss")
            .arg(format!("{:.3}", interval.start))
            .arg("-i")
            .arg(source)
            .arg("-t")
            .arg(format!("{:.3}", interval.duration()));
        cmd.stdout(Stdio::null());
        cmd
    }
}

impl SegmentExtractor for FfmpegExtractor {
    #[instrument(skip(self))]
    fn extract_clip(&self, source: &Path, interval: &Interval, output: &Path, quality: u8) -> Result<()> {
        let mut cmd = Self::base_command(source, interval);
        cmd.args(["-c:v", "libx264", "-crf"])
            .arg(quality.to_string())
            .args(["-c:a", "aac", "-avoid_negative_ts", "make_zero"])
            .arg(output);

        run(cmd, FFMPEG)?;
        debug!("Wrote clip {}", output.display());
        Ok(())
    }

    #[instrument(skip(self))]
    fn extract_frames(&self, source: &Path, interval: &Interval, pattern: &Path, frame_interval: f64) -> Result<()> {
        if let Some(dir) = pattern.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut cmd = Self::base_command(source, interval);
        cmd.arg("-vf")
            .arg(format!("fps=1/{}", frame_interval))
            .args(["-q:v", "2"])
            .arg(pattern);

        run(cmd, FFMPEG)?;
        debug!("Wrote frames {}", pattern.display());
        Ok(())
    }
}

fn ensure_exists(source: &Path) -> Result<()> {
    if !source.exists() {
        return Err(NightScanError::VideoNotFound {
            path: source.display().to_string(),
        });
    }
    Ok(())
}

fn probe_command(source: &Path, entries: &str) -> Command {
    let mut cmd = Command::new(FFPROBE);
    cmd.args(["-v", "quiet", "-select_streams", "v:0", "-show_entries", entries, "-of", "csv=p=0"])
        .arg(source);
    cmd
}

/// Run a prepared command, mapping spawn and exit failures to crate errors
fn run(mut cmd: Command, tool: &str) -> Result<Output> {
    debug!("Running {:?}", cmd);

    let output = cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            NightScanError::ToolNotFound { tool: tool.to_string() }
        } else {
            NightScanError::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("{} failed with {}", tool, output.status);
        return Err(NightScanError::tool_failed(tool, output.status, tail(&stderr, 20)));
    }

    Ok(output)
}

/// Last `lines` lines of `text`, for compact error messages
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Parse ffprobe's `format=duration` output; unknown durations become 0
pub fn parse_duration(text: &str) -> f64 {
    text.trim()
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0)
}

/// Parse ffprobe's `r_frame_rate`, either `"num/den"` or a decimal
///
/// Unparsable values and zero denominators yield 0.
pub fn parse_frame_rate(text: &str) -> f64 {
    let text = text.trim().trim_end_matches(',');
    let rate = match text.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(num), Ok(den)) if den != 0.0 => num / den,
            _ => 0.0,
        },
        None => text.parse::<f64>().unwrap_or(0.0),
    };
    if rate.is_finite() { rate } else { 0.0 }
}
