//! Detection reports
//!
//! A plain-text table written next to the extracted files, and a JSON summary
//! for programmatic consumption.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, instrument};

use crate::common::{Interval, Result};

/// File name of the text report inside the output directory
pub const REPORT_FILE_NAME: &str = "night_detection_report.txt";

/// Everything the report needs about one run
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub generated: DateTime<Local>,
    pub input: String,
    pub luma_threshold: u8,
    pub scene_threshold: Option<f64>,
    pub min_duration: f64,
    pub dark_frames: usize,
    pub scenes: Vec<SceneEntry>,
}

/// One row of the report table
#[derive(Debug, Clone, Serialize)]
pub struct SceneEntry {
    pub scene: usize,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl DetectionReport {
    pub fn new(
        input: &Path,
        luma_threshold: u8,
        scene_threshold: Option<f64>,
        min_duration: f64,
        dark_frames: usize,
        scenes: &[Interval],
    ) -> Self {
        Self {
            generated: Local::now(),
            input: input.display().to_string(),
            luma_threshold,
            scene_threshold,
            min_duration,
            dark_frames,
            scenes: scenes
                .iter()
                .enumerate()
                .map(|(i, s)| SceneEntry {
                    scene: i + 1,
                    start: s.start,
                    end: s.end,
                    duration: s.duration(),
                })
                .collect(),
        }
    }

    /// Render the plain-text report
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(out, "Night Scene Detection Report");
        let _ = writeln!(out, "============================");
        let _ = writeln!(out, "Generated: {}", self.generated.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Input file: {}", self.input);
        let _ = writeln!(out, "Luminance threshold: {}", self.luma_threshold);
        if let Some(threshold) = self.scene_threshold {
            let _ = writeln!(out, "Scene change threshold: {}", threshold);
        }
        let _ = writeln!(out, "Minimum duration: {}s", self.min_duration);
        let _ = writeln!(out);

        if self.scenes.is_empty() {
            let _ = writeln!(out, "No night scenes detected");
            return out;
        }

        let _ = writeln!(out, "Night scenes detected: {}", self.scenes.len());
        let _ = writeln!(out);
        let _ = writeln!(out, "Scene Details:");
        let _ = writeln!(out, "Scene | Start Time | End Time | Duration");
        let _ = writeln!(out, "------|------------|----------|----------");
        for entry in &self.scenes {
            let _ = writeln!(
                out,
                "{:5} | {:10.3}s | {:8.3}s | {:8.3}s",
                entry.scene, entry.start, entry.end, entry.duration
            );
        }
        out
    }

    /// Write the text report into `output_dir`, returning its path
    #[instrument(skip(self))]
    pub fn write_text(&self, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(REPORT_FILE_NAME);
        fs::write(&path, self.render_text())?;
        info!("Report generated: {}", path.display());
        Ok(path)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
