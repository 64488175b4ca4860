//! Common types and error handling for night scene detection.
//!
//! This module provides the foundational types used throughout the codebase:
//! time intervals produced by the segmenter and the crate-wide error type.

use std::fmt;

use serde::Serialize;
use tracing::{debug, instrument};

/// A closed time span within a video, in seconds
///
/// Invariant: `end >= start`. Intervals are produced by the segmenter, the
/// black-frame splitter, and (as [`crate::BlackInterval`] inputs) by ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    /// Create a new interval
    ///
    /// # Panics
    /// Panics if `end < start` (fail-fast approach)
    #[instrument]
    pub fn new(start: f64, end: f64) -> Self {
        assert!(end >= start, "Interval end must not precede start: {} < {}", end, start);
        debug!("Created Interval {:.3}s-{:.3}s", start, end);

        Self { start, end }
    }

    /// Length of the interval in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `t` lies inside the interval, both ends included
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s - {:.3}s ({:.3}s)", self.start, self.end, self.duration())
    }
}

/// Ordered, non-overlapping intervals, ascending by start
pub type SceneList = Vec<Interval>;

/// All possible errors from the detection pipeline
#[derive(Debug, thiserror::Error)]
pub enum NightScanError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Video file not found: {path}")]
    VideoNotFound { path: String },

    #[error("Could not launch {tool}: is it installed and on PATH?")]
    ToolNotFound { tool: String },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Malformed {tool} output: {reason}")]
    MalformedOutput { tool: String, reason: String },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl NightScanError {
    /// Create an input validation error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    /// Create a configuration error with a descriptive message
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Create an error for an external tool that exited unsuccessfully
    pub fn tool_failed(tool: impl Into<String>, status: impl ToString, stderr: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            status: status.to_string(),
            stderr: stderr.into(),
        }
    }

    /// Create an error for tool output that could not be interpreted
    pub fn malformed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Convenient Result type for detection operations
pub type Result<T> = std::result::Result<T, NightScanError>;
