//! Grouping of qualifying frame timestamps into night scenes
//!
//! Every analyzed frame that passed the brightness (and optional scene-change)
//! predicate contributes one timestamp. Timestamps close enough to each other
//! are merged into runs, and runs long enough become scenes.

use tracing::{debug, instrument, trace};

use crate::common::{Interval, NightScanError, Result, SceneList};

/// Default gap tolerance, as a multiple of the minimum scene duration
pub const DEFAULT_GAP_TOLERANCE_FACTOR: f64 = 2.0;

/// Groups observation timestamps into ordered, non-overlapping scenes
///
/// Two consecutive observations belong to the same run when the gap between
/// them is at most `gap_tolerance_factor * min_duration`. A run is kept only
/// if it spans at least `min_duration` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSegmenter {
    min_duration: f64,
    gap_tolerance_factor: f64,
}

impl SceneSegmenter {
    /// Create a segmenter with the default gap tolerance factor
    pub fn new(min_duration: f64) -> Result<Self> {
        Self::with_gap_tolerance(min_duration, DEFAULT_GAP_TOLERANCE_FACTOR)
    }

    /// Create a segmenter with an explicit gap tolerance factor
    #[instrument]
    pub fn with_gap_tolerance(min_duration: f64, gap_tolerance_factor: f64) -> Result<Self> {
        validate_parameters(min_duration, gap_tolerance_factor)?;
        debug!(
            "Created SceneSegmenter with min_duration={}s, gap_tolerance_factor={}",
            min_duration, gap_tolerance_factor
        );

        Ok(Self {
            min_duration,
            gap_tolerance_factor,
        })
    }

    pub fn min_duration(&self) -> f64 {
        self.min_duration
    }

    pub fn gap_tolerance_factor(&self) -> f64 {
        self.gap_tolerance_factor
    }

    /// Largest gap in seconds that still merges two observations
    pub fn max_gap(&self) -> f64 {
        self.gap_tolerance_factor * self.min_duration
    }

    /// Group `observations` into scenes
    ///
    /// Observations may be unordered and contain duplicates.
    ///
    /// # Errors
    /// * `InvalidInput` - If any observation is negative or not finite
    #[instrument(skip(self, observations), fields(count = observations.len()))]
    pub fn segment(&self, observations: &[f64]) -> Result<SceneList> {
        if let Some(bad) = observations.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(NightScanError::invalid_input(format!(
                "Timestamps must be finite and non-negative, got: {}",
                bad
            )));
        }

        let mut sorted = observations.to_vec();
        sorted.sort_by(f64::total_cmp);

        let Some((&first, rest)) = sorted.split_first() else {
            debug!("No observations, no scenes");
            return Ok(Vec::new());
        };

        let max_gap = self.max_gap();
        let mut scenes = Vec::new();
        let mut current_start = first;
        let mut current_end = first;

        for &t in rest {
            if t - current_end <= max_gap {
                current_end = t;
                continue;
            }

            trace!("Gap of {:.3}s after {:.3}s closes run", t - current_end, current_end);
            self.close_run(current_start, current_end, &mut scenes);
            current_start = t;
            current_end = t;
        }

        // The final run never hits the close branch above
        self.close_run(current_start, current_end, &mut scenes);

        debug!("Grouped {} observations into {} scenes", sorted.len(), scenes.len());
        Ok(scenes)
    }

    fn close_run(&self, start: f64, end: f64, scenes: &mut SceneList) {
        if end - start >= self.min_duration {
            debug!("Keeping run {:.3}s-{:.3}s", start, end);
            scenes.push(Interval::new(start, end));
        } else {
            trace!(
                "Dropping run {:.3}s-{:.3}s (shorter than {}s)",
                start, end, self.min_duration
            );
        }
    }
}

/// Group observation timestamps into night scenes
///
/// Convenience wrapper around [`SceneSegmenter`].
///
/// # Errors
/// * `InvalidInput` - If `min_duration <= 0`, the gap factor is negative,
///   or any timestamp is negative
///
/// # Example
/// ```rust
/// use night_scenes::segment;
///
/// let scenes = segment(&[1.0, 1.2, 1.5, 10.0, 10.3, 10.9, 11.4], 1.0, 2.0)?;
/// assert_eq!(scenes.len(), 1);
/// assert_eq!(scenes[0].start, 10.0);
/// assert_eq!(scenes[0].end, 11.4);
/// # Ok::<(), night_scenes::NightScanError>(())
/// ```
pub fn segment(observations: &[f64], min_duration: f64, gap_tolerance_factor: f64) -> Result<SceneList> {
    SceneSegmenter::with_gap_tolerance(min_duration, gap_tolerance_factor)?.segment(observations)
}

fn validate_parameters(min_duration: f64, gap_tolerance_factor: f64) -> Result<()> {
    if !min_duration.is_finite() || min_duration <= 0.0 {
        return Err(NightScanError::invalid_input(format!(
            "Minimum duration must be positive, got: {}",
            min_duration
        )));
    }
    if !gap_tolerance_factor.is_finite() || gap_tolerance_factor < 0.0 {
        return Err(NightScanError::invalid_input(format!(
            "Gap tolerance factor must be non-negative, got: {}",
            gap_tolerance_factor
        )));
    }
    Ok(())
}
