//! Per-scene extraction of clips and frames
//!
//! Each scene is handled independently: a failure is logged and recorded in
//! that scene's [`ExtractionOutcome`], and the remaining scenes are still
//! attempted.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::common::{Interval, Result};
use crate::config::ExtractionPlan;
use crate::ffmpeg::SegmentExtractor;

/// Naming and encoding options shared by all scenes of one run
#[derive(Debug, Clone)]
pub struct ExtractionRequest<'a> {
    pub source: &'a Path,
    pub output_dir: &'a Path,
    /// Input file stem embedded in output names
    pub stem: &'a str,
    /// Clip name prefix, e.g. `night_scene`
    pub prefix: &'a str,
    pub container: &'a str,
    pub quality: u8,
    pub frame_interval: f64,
    pub plan: ExtractionPlan,
}

impl ExtractionRequest<'_> {
    /// Output path of the clip for the 1-based scene `index`
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}_{:03}_{}.{}", self.prefix, index, self.stem, self.container))
    }

    /// Image sequence pattern for the frames of scene `index`
    pub fn frame_pattern(&self, index: usize) -> PathBuf {
        self.output_dir
            .join("frames")
            .join(format!("scene_{:03}", index))
            .join(format!("{}_scene{}_%04d.jpg", self.stem, index))
    }
}

/// Result of extracting one scene
#[derive(Debug)]
pub struct ExtractionOutcome {
    /// 1-based scene number
    pub index: usize,
    pub interval: Interval,
    /// Paths written (clip and/or frame pattern), or the first failure
    pub result: Result<Vec<PathBuf>>,
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Extract every scene in order, isolating failures per scene
#[instrument(skip(extractor, scenes, request), fields(scenes = scenes.len()))]
pub fn extract_scenes<E: SegmentExtractor + ?Sized>(
    extractor: &E,
    scenes: &[Interval],
    request: &ExtractionRequest<'_>,
) -> Vec<ExtractionOutcome> {
    if request.plan.is_empty() || scenes.is_empty() {
        info!("Nothing to extract");
        return Vec::new();
    }

    scenes
        .iter()
        .enumerate()
        .fold(Vec::with_capacity(scenes.len()), |mut outcomes, (i, interval)| {
            let index = i + 1;
            info!("Extracting scene {}: {}", index, interval);

            let result = extract_one(extractor, index, interval, request);
            if let Err(e) = &result {
                warn!("Scene {} failed, continuing with the rest: {}", index, e);
            }

            outcomes.push(ExtractionOutcome {
                index,
                interval: *interval,
                result,
            });
            outcomes
        })
}

fn extract_one<E: SegmentExtractor + ?Sized>(
    extractor: &E,
    index: usize,
    interval: &Interval,
    request: &ExtractionRequest<'_>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if request.plan.videos {
        let clip = request.clip_path(index);
        extractor.extract_clip(request.source, interval, &clip, request.quality)?;
        written.push(clip);
    }

    if request.plan.frames {
        info!("Extracting frames from scene {} (every {}s)", index, request.frame_interval);
        let pattern = request.frame_pattern(index);
        extractor.extract_frames(request.source, interval, &pattern, request.frame_interval)?;
        written.push(pattern);
    }

    Ok(written)
}

/// Count of successful and failed outcomes
pub fn tally(outcomes: &[ExtractionOutcome]) -> (usize, usize) {
    let ok = outcomes.iter().filter(|o| o.is_success()).count();
    (ok, outcomes.len() - ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NightScanError;
    use std::cell::RefCell;

    /// Records calls and fails clips whose start matches `fail_at`
    #[derive(Default)]
    struct RecordingExtractor {
        fail_at: Option<f64>,
        calls: RefCell<Vec<String>>,
    }

    impl SegmentExtractor for RecordingExtractor {
        fn extract_clip(&self, _source: &Path, interval: &Interval, output: &Path, quality: u8) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("clip {} q{} {}", interval.start, quality, output.display()));
            if self.fail_at == Some(interval.start) {
                return Err(NightScanError::tool_failed("ffmpeg", "exit status: 1", "disk full"));
            }
            Ok(())
        }

        fn extract_frames(&self, _source: &Path, interval: &Interval, pattern: &Path, frame_interval: f64) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("frames {} every {} {}", interval.start, frame_interval, pattern.display()));
            Ok(())
        }
    }

    fn request(plan: ExtractionPlan) -> ExtractionRequest<'static> {
        ExtractionRequest {
            source: Path::new("/media/film.mkv"),
            output_dir: Path::new("/out"),
            stem: "film",
            prefix: "night_scene",
            container: "mp4",
            quality: 23,
            frame_interval: 2.0,
            plan,
        }
    }

    #[test]
    fn test_output_naming() {
        let req = request(ExtractionPlan::default());
        assert_eq!(req.clip_path(7), PathBuf::from("/out/night_scene_007_film.mp4"));
        assert_eq!(
            req.frame_pattern(12),
            PathBuf::from("/out/frames/scene_012/film_scene12_%04d.jpg")
        );
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let extractor = RecordingExtractor {
            fail_at: Some(20.0),
            ..Default::default()
        };
        let scenes = vec![Interval::new(1.0, 3.0), Interval::new(20.0, 25.0), Interval::new(40.0, 41.0)];
        let plan = ExtractionPlan { videos: true, frames: true };

        let outcomes = extract_scenes(&extractor, &scenes, &request(plan));

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert!(outcomes[2].is_success());
        assert_eq!(outcomes.iter().map(|o| o.index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(tally(&outcomes), (2, 1));

        // Failed clip skips that scene's frames, later scenes still run
        let calls = extractor.calls.borrow();
        assert_eq!(calls.len(), 5);
        assert!(calls[2].starts_with("clip 20"));
        assert!(calls[3].starts_with("clip 40"));
        assert!(calls[4].starts_with("frames 40 every 2"));
    }

    #[test]
    fn test_frames_only_plan() {
        let extractor = RecordingExtractor::default();
        let scenes = vec![Interval::new(5.0, 7.0)];

        let outcomes = extract_scenes(&extractor, &scenes, &request(ExtractionPlan::default()));

        assert_eq!(outcomes.len(), 1);
        let written = outcomes[0].result.as_ref().unwrap();
        assert_eq!(written, &vec![PathBuf::from("/out/frames/scene_001/film_scene1_%04d.jpg")]);
        assert_eq!(extractor.calls.borrow().len(), 1);
    }

    #[test]
    fn test_empty_plan_or_scenes() {
        let extractor = RecordingExtractor::default();
        let none = ExtractionPlan { videos: false, frames: false };
        assert!(extract_scenes(&extractor, &[Interval::new(0.0, 2.0)], &request(none)).is_empty());
        assert!(extract_scenes(&extractor, &[], &request(ExtractionPlan::default())).is_empty());
        assert!(extractor.calls.borrow().is_empty());
    }
}
