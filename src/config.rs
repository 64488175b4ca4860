//! Immutable run configuration
//!
//! A [`DetectionConfig`] is built once from command-line flags, validated,
//! and then passed by reference to every stage of the pipeline.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::common::{NightScanError, Result};
use crate::segmenter::{SceneSegmenter, DEFAULT_GAP_TOLERANCE_FACTOR};

pub const DEFAULT_OUTPUT_DIR: &str = "./night_scenes";
pub const DEFAULT_LUMA_THRESHOLD: u8 = 30;
pub const DEFAULT_MIN_DURATION: f64 = 1.0;
pub const DEFAULT_FRAME_INTERVAL: f64 = 1.0;
pub const DEFAULT_QUALITY: u8 = 2;
pub const DEFAULT_CONTAINER: &str = "mp4";

/// File name of the persisted raw analysis log inside the output directory
pub const ANALYSIS_LOG_NAME: &str = "brightness_analysis.txt";

/// What to produce for each detected scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionPlan {
    pub videos: bool,
    pub frames: bool,
}

impl ExtractionPlan {
    /// Whether anything at all will be extracted
    pub fn is_empty(&self) -> bool {
        !self.videos && !self.frames
    }

    /// Human-readable list of the outputs, e.g. "videos, frames"
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.videos {
            parts.push("videos");
        }
        if self.frames {
            parts.push("frames");
        }
        if parts.is_empty() {
            "nothing".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl Default for ExtractionPlan {
    fn default() -> Self {
        // Frames only unless videos are requested
        Self {
            videos: false,
            frames: true,
        }
    }
}

/// Settings for night scene detection and extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Frames with a mean luma below this value (0-255) count as dark
    pub luma_threshold: u8,
    pub min_duration: f64,
    pub gap_tolerance_factor: f64,
    /// When set, a frame must also have a scene-change score above this (0-1)
    pub scene_threshold: Option<f64>,
    pub plan: ExtractionPlan,
    /// Seconds between extracted frames
    pub frame_interval: f64,
    /// x264 CRF used for extracted clips
    pub quality: u8,
    /// Container extension for extracted clips
    pub container: String,
    pub keep_analysis_log: bool,
}

impl DetectionConfig {
    /// Create a configuration for `input` with every other setting at its default
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            luma_threshold: DEFAULT_LUMA_THRESHOLD,
            min_duration: DEFAULT_MIN_DURATION,
            gap_tolerance_factor: DEFAULT_GAP_TOLERANCE_FACTOR,
            scene_threshold: None,
            plan: ExtractionPlan::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            quality: DEFAULT_QUALITY,
            container: DEFAULT_CONTAINER.to_string(),
            keep_analysis_log: true,
        }
    }

    /// Check that all settings are usable
    ///
    /// # Errors
    /// * `InvalidConfig` - Describing the first offending setting
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<()> {
        if !self.min_duration.is_finite() || self.min_duration <= 0.0 {
            return Err(NightScanError::config_error(format!(
                "Minimum duration must be positive, got: {}",
                self.min_duration
            )));
        }
        if !self.gap_tolerance_factor.is_finite() || self.gap_tolerance_factor < 0.0 {
            return Err(NightScanError::config_error(format!(
                "Gap tolerance factor must be non-negative, got: {}",
                self.gap_tolerance_factor
            )));
        }
        if let Some(threshold) = self.scene_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(NightScanError::config_error(format!(
                    "Scene threshold must be within 0-1, got: {}",
                    threshold
                )));
            }
        }
        if !self.frame_interval.is_finite() || self.frame_interval <= 0.0 {
            return Err(NightScanError::config_error(format!(
                "Frame interval must be positive, got: {}",
                self.frame_interval
            )));
        }
        if !(1..=51).contains(&self.quality) {
            return Err(NightScanError::config_error(format!(
                "Quality must be within 1-51, got: {}",
                self.quality
            )));
        }
        if self.container.trim().is_empty() || self.container.contains(['/', '\\', '.']) {
            return Err(NightScanError::config_error(format!(
                "Invalid output format: {:?}",
                self.container
            )));
        }

        debug!("Configuration valid: {:?}", self);
        Ok(())
    }

    /// Segmenter matching this configuration
    pub fn segmenter(&self) -> Result<SceneSegmenter> {
        SceneSegmenter::with_gap_tolerance(self.min_duration, self.gap_tolerance_factor)
    }

    /// File stem of the input, used to name outputs
    pub fn input_stem(&self) -> String {
        file_stem(&self.input)
    }

    /// Where the raw analysis log goes, if it is kept
    pub fn analysis_log_path(&self) -> Option<PathBuf> {
        self.keep_analysis_log.then(|| self.output_dir.join(ANALYSIS_LOG_NAME))
    }
}

/// Settings for splitting a video at black-frame transitions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlackSplitConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Shortest black run, in seconds, that counts as a transition
    pub min_black_duration: f64,
    /// blackdetect `pix_th`: ratio under which a pixel counts as black
    pub pixel_threshold: f64,
    /// blackdetect `pic_th`: ratio of black pixels for a black picture
    pub picture_threshold: f64,
    /// Pieces shorter than this are not extracted
    pub min_segment_duration: f64,
    pub quality: u8,
    pub container: String,
}

impl BlackSplitConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: PathBuf::from("./segments"),
            min_black_duration: 0.5,
            pixel_threshold: 0.10,
            picture_threshold: 0.98,
            min_segment_duration: 1.0,
            quality: 18,
            container: DEFAULT_CONTAINER.to_string(),
        }
    }

    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<()> {
        if !self.min_black_duration.is_finite() || self.min_black_duration <= 0.0 {
            return Err(NightScanError::config_error(format!(
                "Minimum black duration must be positive, got: {}",
                self.min_black_duration
            )));
        }
        for (name, value) in [
            ("Pixel threshold", self.pixel_threshold),
            ("Picture threshold", self.picture_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(NightScanError::config_error(format!(
                    "{} must be within 0-1, got: {}",
                    name, value
                )));
            }
        }
        if !self.min_segment_duration.is_finite() || self.min_segment_duration < 0.0 {
            return Err(NightScanError::config_error(format!(
                "Minimum segment duration must be non-negative, got: {}",
                self.min_segment_duration
            )));
        }
        if !(1..=51).contains(&self.quality) {
            return Err(NightScanError::config_error(format!(
                "Quality must be within 1-51, got: {}",
                self.quality
            )));
        }
        if self.container.trim().is_empty() {
            return Err(NightScanError::config_error("Output format must not be empty"));
        }
        Ok(())
    }

    pub fn input_stem(&self) -> String {
        file_stem(&self.input)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectionConfig::new("movie.mkv");
        assert_eq!(config.output_dir, PathBuf::from("./night_scenes"));
        assert_eq!(config.luma_threshold, 30);
        assert_eq!(config.min_duration, 1.0);
        assert_eq!(config.gap_tolerance_factor, 2.0);
        assert_eq!(config.scene_threshold, None);
        assert_eq!(config.plan, ExtractionPlan { videos: false, frames: true });
        assert_eq!(config.frame_interval, 1.0);
        assert_eq!(config.quality, 2);
        assert_eq!(config.container, "mp4");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let valid = DetectionConfig::new("movie.mkv");

        let cases = [
            DetectionConfig { min_duration: 0.0, ..valid.clone() },
            DetectionConfig { min_duration: -2.0, ..valid.clone() },
            DetectionConfig { gap_tolerance_factor: -1.0, ..valid.clone() },
            DetectionConfig { scene_threshold: Some(1.5), ..valid.clone() },
            DetectionConfig { frame_interval: 0.0, ..valid.clone() },
            DetectionConfig { quality: 0, ..valid.clone() },
            DetectionConfig { quality: 52, ..valid.clone() },
            DetectionConfig { container: "".to_string(), ..valid.clone() },
            DetectionConfig { container: "../mp4".to_string(), ..valid.clone() },
        ];

        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, NightScanError::InvalidConfig { .. }), "{:?}", config);
        }
    }

    #[test]
    fn test_scene_threshold_bounds_accepted() {
        let mut config = DetectionConfig::new("movie.mkv");
        config.scene_threshold = Some(0.0);
        assert!(config.validate().is_ok());
        config.scene_threshold = Some(1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_input_stem_and_log_path() {
        let mut config = DetectionConfig::new("/videos/The Night.Of.mp4");
        config.output_dir = PathBuf::from("/tmp/out");
        assert_eq!(config.input_stem(), "The Night.Of");
        assert_eq!(
            config.analysis_log_path(),
            Some(PathBuf::from("/tmp/out/brightness_analysis.txt"))
        );

        config.keep_analysis_log = false;
        assert_eq!(config.analysis_log_path(), None);
    }

    #[test]
    fn test_segmenter_from_config() {
        let mut config = DetectionConfig::new("a.mp4");
        config.min_duration = 2.5;
        config.gap_tolerance_factor = 1.0;
        let segmenter = config.segmenter().unwrap();
        assert_eq!(segmenter.max_gap(), 2.5);
    }

    #[test]
    fn test_plan_describe() {
        assert_eq!(ExtractionPlan { videos: true, frames: true }.describe(), "videos, frames");
        assert_eq!(ExtractionPlan::default().describe(), "frames");
        let none = ExtractionPlan { videos: false, frames: false };
        assert!(none.is_empty());
        assert_eq!(none.describe(), "nothing");
    }

    #[test]
    fn test_black_split_validation() {
        let valid = BlackSplitConfig::new("show.mp4");
        assert!(valid.validate().is_ok());
        assert_eq!(valid.input_stem(), "show");

        assert!(BlackSplitConfig { min_black_duration: 0.0, ..valid.clone() }.validate().is_err());
        assert!(BlackSplitConfig { pixel_threshold: 1.2, ..valid.clone() }.validate().is_err());
        assert!(BlackSplitConfig { picture_threshold: -0.1, ..valid.clone() }.validate().is_err());
        assert!(BlackSplitConfig { min_segment_duration: -1.0, ..valid.clone() }.validate().is_err());
        assert!(BlackSplitConfig { quality: 60, ..valid }.validate().is_err());
    }
}
