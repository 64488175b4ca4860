//! Parsing of ffmpeg analysis logs
//!
//! ffmpeg reports per-frame statistics on stderr. This module turns those log
//! lines into typed samples so the rest of the crate never touches raw text:
//!
//! * `showinfo` lines carry the presentation time and mean plane values
//! * `metadata=print` lines carry `lavfi.scene_score` for the frame before
//! * `blackdetect` lines carry black spans

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use crate::common::{Interval, Result};

/// Statistics ffmpeg reported for one analyzed frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSample {
    pub timestamp: f64,
    /// Mean of the luma plane, 0-255
    pub mean_luma: u8,
    /// Scene-change score (0-1), present only when scene scoring was requested
    pub scene_score: Option<f64>,
}

/// A span ffmpeg's blackdetect filter reported as black
pub type BlackInterval = Interval;

/// Decides whether a frame counts as a night observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePredicate {
    pub luma_threshold: u8,
    pub scene_threshold: Option<f64>,
}

impl FramePredicate {
    /// Brightness-only predicate
    pub fn dark(luma_threshold: u8) -> Self {
        Self {
            luma_threshold,
            scene_threshold: None,
        }
    }

    /// Brightness and scene-change predicate
    pub fn dark_scene_change(luma_threshold: u8, scene_threshold: f64) -> Self {
        Self {
            luma_threshold,
            scene_threshold: Some(scene_threshold),
        }
    }

    /// Whether a scene-change score is needed to evaluate this predicate
    pub fn needs_scene_scores(&self) -> bool {
        self.scene_threshold.is_some()
    }

    pub fn matches(&self, sample: &FrameSample) -> bool {
        if sample.mean_luma >= self.luma_threshold {
            return false;
        }
        match (self.scene_threshold, sample.scene_score) {
            (None, _) => true,
            (Some(threshold), Some(score)) => score > threshold,
            (Some(_), None) => false,
        }
    }
}

/// Timestamps of all samples that satisfy `predicate`, in input order
#[instrument(skip(samples), fields(samples = samples.len()))]
pub fn observations(samples: &[FrameSample], predicate: &FramePredicate) -> Vec<f64> {
    let timestamps: Vec<f64> = samples
        .iter()
        .filter(|sample| predicate.matches(sample))
        .map(|sample| sample.timestamp)
        .collect();

    debug!(
        "{} of {} frames pass (luma < {}, scene > {:?})",
        timestamps.len(),
        samples.len(),
        predicate.luma_threshold,
        predicate.scene_threshold
    );
    timestamps
}

/// Line-oriented parser for ffmpeg filter logs
#[derive(Debug)]
pub struct LogParser {
    showinfo: Regex,
    metadata_frame: Regex,
    scene_score: Regex,
    blackdetect: Regex,
}

impl LogParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            showinfo: Regex::new(r"Parsed_showinfo.*pts_time:\s*([0-9]*\.?[0-9]+).*mean:\[\s*([0-9]+)")?,
            metadata_frame: Regex::new(r"Parsed_metadata.*pts_time:\s*([0-9]*\.?[0-9]+)")?,
            scene_score: Regex::new(r"lavfi\.scene_score=([0-9]*\.?[0-9]+)")?,
            blackdetect: Regex::new(
                r"black_start:\s*([0-9]*\.?[0-9]+)\s+black_end:\s*([0-9]*\.?[0-9]+)",
            )?,
        })
    }

    /// Parse showinfo (and optional metadata) output into frame samples
    ///
    /// Lines that do not carry both a timestamp and a mean are skipped.
    /// Scene scores are matched to frames by presentation time.
    #[instrument(skip(self, log))]
    pub fn frame_samples(&self, log: &str) -> Vec<FrameSample> {
        let mut scores: HashMap<u64, f64> = HashMap::new();
        let mut pending_frame: Option<f64> = None;
        let mut samples = Vec::new();

        for line in log.lines() {
            if let Some(caps) = self.metadata_frame.captures(line) {
                pending_frame = caps[1].parse::<f64>().ok();
                continue;
            }

            if let Some(caps) = self.scene_score.captures(line) {
                match (pending_frame.take(), caps[1].parse::<f64>()) {
                    (Some(time), Ok(score)) => {
                        scores.insert(time.to_bits(), score);
                    }
                    _ => trace!("Scene score without a frame line: {}", line),
                }
                continue;
            }

            let Some(caps) = self.showinfo.captures(line) else {
                continue;
            };
            let (Ok(timestamp), Ok(mean)) = (caps[1].parse::<f64>(), caps[2].parse::<u32>()) else {
                trace!("Skipping unparsable showinfo line: {}", line);
                continue;
            };

            samples.push(FrameSample {
                timestamp,
                mean_luma: mean.min(u8::MAX as u32) as u8,
                scene_score: None,
            });
        }

        if !scores.is_empty() {
            for sample in &mut samples {
                sample.scene_score = scores.get(&sample.timestamp.to_bits()).copied();
            }
        }

        debug!("Parsed {} frame samples ({} scene scores)", samples.len(), scores.len());
        samples
    }

    /// Parse blackdetect output into black intervals
    #[instrument(skip(self, log))]
    pub fn black_intervals(&self, log: &str) -> Vec<BlackInterval> {
        let intervals: Vec<BlackInterval> = self
            .blackdetect
            .captures_iter(log)
            .filter_map(|caps| {
                let start = caps[1].parse::<f64>().ok()?;
                let end = caps[2].parse::<f64>().ok()?;
                (end >= start).then(|| Interval::new(start, end))
            })
            .collect();

        debug!("Parsed {} black intervals", intervals.len());
        intervals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOWINFO_LOG: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'night.mp4':
  Duration: 00:00:12.00, start: 0.000000, bitrate: 1205 kb/s
[Parsed_showinfo_0 @ 0x5581c] config in time_base: 1/12800, frame_rate: 25/1
[Parsed_showinfo_0 @ 0x5581c] n:   0 pts:      0 pts_time:0       duration:    512 fmt:yuv420p sar:1/1 s:1920x1080 i:P iskey:1 type:I checksum:9A1B2C3D plane_checksum:[1 2 3] mean:[18 128 128] stdev:[3.1 0.4 0.5]
[Parsed_showinfo_0 @ 0x5581c] n:   1 pts:    512 pts_time:0.04    duration:    512 fmt:yuv420p sar:1/1 s:1920x1080 i:P iskey:0 type:P checksum:1A1B2C3D plane_checksum:[1 2 3] mean:[142 127 129] stdev:[40.0 2.1 2.2]
[Parsed_showinfo_0 @ 0x5581c] n:   2 pts:   1024 pts_time:0.08    duration:    512 fmt:yuv420p sar:1/1 s:1920x1080 i:P iskey:0 type:P checksum:2A1B2C3D plane_checksum:[1 2 3] mean:[ 9 128 128] stdev:[1.0 0.1 0.1]
frame=  300 fps=0.0 q=-0.0 Lsize=N/A time=00:00:12.00 bitrate=N/A speed= 412x
";

    const SCENE_LOG: &str = "\
[Parsed_metadata_1 @ 0x55a] frame:0    pts:0       pts_time:0
[Parsed_metadata_1 @ 0x55a] lavfi.scene_score=0.000000
[Parsed_showinfo_2 @ 0x55b] n:   0 pts:      0 pts_time:0       duration:512 mean:[12 128 128] stdev:[1 1 1]
[Parsed_metadata_1 @ 0x55a] frame:1    pts:512     pts_time:0.04
[Parsed_metadata_1 @ 0x55a] lavfi.scene_score=0.412000
[Parsed_showinfo_2 @ 0x55b] n:   1 pts:    512 pts_time:0.04    duration:512 mean:[14 128 128] stdev:[1 1 1]
[Parsed_metadata_1 @ 0x55a] frame:2    pts:1024    pts_time:0.08
[Parsed_metadata_1 @ 0x55a] lavfi.scene_score=0.051000
[Parsed_showinfo_2 @ 0x55b] n:   2 pts:   1024 pts_time:0.08    duration:512 mean:[90 128 128] stdev:[1 1 1]
";

    const BLACKDETECT_LOG: &str = "\
[blackdetect @ 0x7f8e] black_start:0 black_end:2.002 black_duration:2.002
[blackdetect @ 0x7f8e] black_start:634.4 black_end:636.12 black_duration:1.72
frame=25000 fps=900 q=-0.0 Lsize=N/A time=00:16:40.00 bitrate=N/A
";

    #[test]
    fn test_parse_showinfo() {
        let parser = LogParser::new().unwrap();
        let samples = parser.frame_samples(SHOWINFO_LOG);

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].timestamp, 0.0);
        assert_eq!(samples[0].mean_luma, 18);
        assert_eq!(samples[1].timestamp, 0.04);
        assert_eq!(samples[1].mean_luma, 142);
        assert_eq!(samples[2].mean_luma, 9);
        assert!(samples.iter().all(|s| s.scene_score.is_none()));
    }

    #[test]
    fn test_parse_scene_scores() {
        let parser = LogParser::new().unwrap();
        let samples = parser.frame_samples(SCENE_LOG);

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].scene_score, Some(0.0));
        assert_eq!(samples[1].scene_score, Some(0.412));
        assert_eq!(samples[2].scene_score, Some(0.051));
    }

    #[test]
    fn test_parse_empty_and_noise() {
        let parser = LogParser::new().unwrap();
        assert!(parser.frame_samples("").is_empty());
        assert!(parser.frame_samples("frame= 10 fps=0.0\nmean:[12 0 0]\n").is_empty());
        assert!(parser.black_intervals("nothing to see").is_empty());
    }

    #[test]
    fn test_parse_blackdetect() {
        let parser = LogParser::new().unwrap();
        let intervals = parser.black_intervals(BLACKDETECT_LOG);

        assert_eq!(intervals, vec![Interval::new(0.0, 2.002), Interval::new(634.4, 636.12)]);
    }

    #[test]
    fn test_dark_predicate() {
        let predicate = FramePredicate::dark(30);
        let sample = |luma| FrameSample { timestamp: 1.0, mean_luma: luma, scene_score: None };

        assert!(predicate.matches(&sample(0)));
        assert!(predicate.matches(&sample(29)));
        assert!(!predicate.matches(&sample(30)));
        assert!(!predicate.matches(&sample(200)));
        assert!(!predicate.needs_scene_scores());
    }

    #[test]
    fn test_scene_change_predicate() {
        let predicate = FramePredicate::dark_scene_change(30, 0.3);
        let sample = |luma, score| FrameSample { timestamp: 1.0, mean_luma: luma, scene_score: score };

        assert!(predicate.matches(&sample(10, Some(0.31))));
        assert!(!predicate.matches(&sample(10, Some(0.3))));
        assert!(!predicate.matches(&sample(10, None)));
        assert!(!predicate.matches(&sample(40, Some(0.9))));
        assert!(predicate.needs_scene_scores());
    }

    #[test]
    fn test_observations_from_log() {
        let parser = LogParser::new().unwrap();
        let samples = parser.frame_samples(SHOWINFO_LOG);
        assert_eq!(observations(&samples, &FramePredicate::dark(30)), vec![0.0, 0.08]);

        let samples = parser.frame_samples(SCENE_LOG);
        let predicate = FramePredicate::dark_scene_change(30, 0.1);
        assert_eq!(observations(&samples, &predicate), vec![0.04]);
    }
}
