//! Motion intervals and traces.
//!
//! A [`MotionInterval`] is a closed time range (in seconds) that contains
//! motion. A [`MotionTrace`] is the ordered list of intervals produced for a
//! single video: the segmenter emits them in increasing start order and the
//! merger keeps that order while removing overlaps.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building intervals or traces.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntervalError {
    #[error("interval bounds must be finite (start={start}, end={end})")]
    NotFinite { start: f64, end: f64 },

    #[error("interval start must not be negative (start={0})")]
    NegativeStart(f64),

    #[error("interval end {end} is before start {start}")]
    EndBeforeStart { start: f64, end: f64 },

    #[error("interval starting at {next} is out of order (previous start {previous})")]
    OutOfOrder { previous: f64, next: f64 },
}

/// A time range classified as containing motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalBounds")]
pub struct MotionInterval {
    start: f64,
    end: f64,
}

impl MotionInterval {
    /// Create an interval, checking `0 <= start <= end`.
    pub fn new(start: f64, end: f64) -> Result<Self, IntervalError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(IntervalError::NotFinite { start, end });
        }
        if start < 0.0 {
            return Err(IntervalError::NegativeStart(start));
        }
        if end < start {
            return Err(IntervalError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Interval covering `[start_frame, end_frame]` at `fps`.
    pub fn from_frames(start_frame: u64, end_frame: u64, fps: f64) -> Result<Self, IntervalError> {
        Self::new(start_frame as f64 / fps, end_frame as f64 / fps)
    }

    /// Start time in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Silent gap between the end of `self` and the start of `next`.
    ///
    /// Negative when the intervals overlap.
    pub fn gap_to(&self, next: &MotionInterval) -> f64 {
        next.start - self.end
    }

    /// Return a copy whose end is extended to cover `other`.
    pub fn extended_to(&self, other: &MotionInterval) -> MotionInterval {
        MotionInterval {
            start: self.start,
            end: self.end.max(other.end),
        }
    }
}

/// Unchecked wire form of [`MotionInterval`].
#[derive(Deserialize)]
struct IntervalBounds {
    start: f64,
    end: f64,
}

impl TryFrom<IntervalBounds> for MotionInterval {
    type Error = IntervalError;

    fn try_from(bounds: IntervalBounds) -> Result<Self, Self::Error> {
        Self::new(bounds.start, bounds.end)
    }
}

/// Ordered sequence of motion intervals for one video.
///
/// Serialized as a plain list; deserialization enforces start order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MotionInterval>")]
pub struct MotionTrace(Vec<MotionInterval>);

impl TryFrom<Vec<MotionInterval>> for MotionTrace {
    type Error = IntervalError;

    fn try_from(intervals: Vec<MotionInterval>) -> Result<Self, Self::Error> {
        Self::from_ordered(intervals)
    }
}

impl MotionTrace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a trace from intervals that must already be ordered by start.
    pub fn from_ordered(intervals: Vec<MotionInterval>) -> Result<Self, IntervalError> {
        let mut trace = Self(Vec::with_capacity(intervals.len()));
        for interval in intervals {
            trace.push(interval)?;
        }
        Ok(trace)
    }

    /// Append an interval. Its start must not precede the last start.
    pub fn push(&mut self, interval: MotionInterval) -> Result<(), IntervalError> {
        if let Some(last) = self.0.last() {
            if interval.start < last.start {
                return Err(IntervalError::OutOfOrder {
                    previous: last.start,
                    next: interval.start,
                });
            }
        }
        self.0.push(interval);
        Ok(())
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the trace has no intervals.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate intervals in order.
    pub fn iter(&self) -> std::slice::Iter<'_, MotionInterval> {
        self.0.iter()
    }

    /// Borrow the intervals.
    pub fn as_slice(&self) -> &[MotionInterval] {
        &self.0
    }

    /// Sum of interval durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.0.iter().map(MotionInterval::duration).sum()
    }

    /// Longest single interval in seconds.
    pub fn longest(&self) -> Option<f64> {
        self.0
            .iter()
            .map(MotionInterval::duration)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Whether no two intervals overlap.
    pub fn is_disjoint(&self) -> bool {
        self.0.windows(2).all(|w| w[0].end <= w[1].start)
    }
}

/// Collects intervals in start order regardless of input order.
impl FromIterator<MotionInterval> for MotionTrace {
    fn from_iter<I: IntoIterator<Item = MotionInterval>>(iter: I) -> Self {
        let mut intervals: Vec<MotionInterval> = iter.into_iter().collect();
        intervals.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self(intervals)
    }
}

impl<'a> IntoIterator for &'a MotionTrace {
    type Item = &'a MotionInterval;
    type IntoIter = std::slice::Iter<'a, MotionInterval>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
