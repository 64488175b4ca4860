//! Splitting a video into content segments at black-frame transitions

use tracing::{debug, instrument, trace};

use crate::analysis::BlackInterval;
use crate::common::{Interval, NightScanError, Result};

/// Content spans between black intervals
///
/// Black intervals are sorted, clipped to `[0, total_duration]` and merged
/// where they touch or overlap. The complement within `[0, total_duration]`
/// is returned, dropping pieces shorter than `min_segment`.
///
/// # Errors
/// * `InvalidInput` - If `total_duration` is not positive or `min_segment` is negative
#[instrument(skip(black), fields(black = black.len()))]
pub fn content_segments(black: &[BlackInterval], total_duration: f64, min_segment: f64) -> Result<Vec<Interval>> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(NightScanError::invalid_input(format!(
            "Total duration must be positive, got: {}",
            total_duration
        )));
    }
    if !min_segment.is_finite() || min_segment < 0.0 {
        return Err(NightScanError::invalid_input(format!(
            "Minimum segment duration must be non-negative, got: {}",
            min_segment
        )));
    }

    let mut spans: Vec<Interval> = black
        .iter()
        .filter(|b| b.end > 0.0 && b.start < total_duration)
        .map(|b| Interval::new(b.start.max(0.0), b.end.min(total_duration)))
        .collect();
    spans.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut segments = Vec::new();
    let mut cursor = 0.0_f64;
    for span in spans {
        if span.start > cursor {
            push_segment(&mut segments, cursor, span.start, min_segment);
        }
        cursor = cursor.max(span.end);
    }
    if total_duration > cursor {
        push_segment(&mut segments, cursor, total_duration, min_segment);
    }

    debug!("Split into {} content segments", segments.len());
    Ok(segments)
}

fn push_segment(segments: &mut Vec<Interval>, start: f64, end: f64, min_segment: f64) {
    if end - start >= min_segment {
        segments.push(Interval::new(start, end));
    } else {
        trace!("Dropping short segment {:.3}s-{:.3}s", start, end);
    }
}
