//! State machine turning per-frame motion flags into motion intervals.
//!
//! # State Machine
//!
//! ```text
//!                      motion
//!     ┌───────────────────────────────────────┐
//!     │                                       ▼
//! ┌──────┐                              ┌──────────┐  motion: quiet = 0
//! │ Idle │                              │  Active  │◄──────────┐
//! └──────┘                              └──────────┘───────────┘
//!     ▲                                       │
//!     │     quiet == no_motion_frames_required│
//!     └──────────── emit interval ────────────┘
//! ```
//!
//! An interval closes at the frame where the quiet run began:
//! `end = (i - required * stride) / fps`. If the stream ends while active,
//! the interval runs to `total_frames / fps`.
//!
//! All bookkeeping is in integer frame indices; seconds are computed only
//! when an interval is emitted.

use curator_models::{MotionInterval, MotionTrace};

use super::config::MotionConfig;
use crate::error::{MediaError, MediaResult};

/// Segmenter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// No interval open.
    Idle,
    /// An interval is open.
    Active {
        /// Frame index where motion started.
        start_frame: u64,
        /// Consecutive processed frames without motion.
        quiet_frames: u32,
    },
}

/// Converts a stream of motion flags into a [`MotionTrace`].
#[derive(Debug, Clone)]
pub struct MotionSegmenter {
    fps: f64,
    stride: u64,
    required: u32,
    state: SegmenterState,
    trace: MotionTrace,
    last_frame: Option<u64>,
}

impl MotionSegmenter {
    /// Create a segmenter for a stream at `fps`.
    pub fn new(fps: f64, config: &MotionConfig) -> MediaResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MediaError::invalid_video(format!("Invalid frame rate {}", fps)));
        }
        config.validate()?;

        Ok(Self {
            fps,
            stride: config.frame_stride as u64,
            required: config.no_motion_frames_required,
            state: SegmenterState::Idle,
            trace: MotionTrace::new(),
            last_frame: None,
        })
    }

    /// Current state.
    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// Intervals closed so far.
    pub fn emitted(&self) -> &MotionTrace {
        &self.trace
    }

    /// Process the motion flag of frame `frame_index`.
    ///
    /// Frame indices must strictly increase.
    pub fn ingest(&mut self, frame_index: u64, motion: bool) -> MediaResult<()> {
        if let Some(last) = self.last_frame {
            if frame_index <= last {
                return Err(MediaError::internal(format!(
                    "Frame {} ingested after frame {}",
                    frame_index, last
                )));
            }
        }
        self.last_frame = Some(frame_index);

        match (self.state, motion) {
            (SegmenterState::Idle, true) => {
                self.state = SegmenterState::Active {
                    start_frame: frame_index,
                    quiet_frames: 0,
                };
            }
            (SegmenterState::Idle, false) => {}
            (SegmenterState::Active { start_frame, .. }, true) => {
                self.state = SegmenterState::Active {
                    start_frame,
                    quiet_frames: 0,
                };
            }
            (
                SegmenterState::Active {
                    start_frame,
                    quiet_frames,
                },
                false,
            ) => {
                let quiet_frames = quiet_frames + 1;
                if quiet_frames >= self.required {
                    let backdate = self.required as u64 * self.stride;
                    let end_frame = frame_index.saturating_sub(backdate).max(start_frame);
                    self.emit(start_frame, end_frame)?;
                    self.state = SegmenterState::Idle;
                } else {
                    self.state = SegmenterState::Active {
                        start_frame,
                        quiet_frames,
                    };
                }
            }
        }

        Ok(())
    }

    /// Close any open interval at `total_frames` and return the trace.
    pub fn finish(mut self, total_frames: u64) -> MediaResult<MotionTrace> {
        if let SegmenterState::Active { start_frame, .. } = self.state {
            self.emit(start_frame, total_frames.max(start_frame))?;
            self.state = SegmenterState::Idle;
        }
        Ok(self.trace)
    }

    fn emit(&mut self, start_frame: u64, end_frame: u64) -> MediaResult<()> {
        let interval = MotionInterval::from_frames(start_frame, end_frame, self.fps)?;
        self.trace.push(interval)?;
        Ok(())
    }
}
