#![deny(unreachable_patterns)]
//! FFmpeg-backed motion curation.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio
//! - Constant frame rate normalization
//! - Streaming motion segmentation over an adaptive background model
//! - Interval merging and frame-accurate clip assembly

pub mod assemble;
pub mod command;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod merge;
pub mod motion;
pub mod normalize;
pub mod probe;
pub mod progress;

pub use assemble::{
    assemble_clip, plan_segments, planned_duration, AssembleOptions, AssemblyOutcome, SegmentPlan,
};
pub use command::{cancel_requested, check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::GrayFrameReader;
pub use fs_utils::{move_file, persist_over, temp_file_beside};
pub use merge::{merge_intervals, DEFAULT_MERGE_GAP_SECS};
pub use motion::{
    detect_motion, BackgroundModel, BackgroundModelConfig, FrameMotion, MotionAnalysis,
    MotionAnalyzer, MotionConfig, MotionDetector, MotionSegmenter, SegmenterState,
};
pub use normalize::{
    normalize_frame_rate, normalize_in_place, NormalizeOptions, DEFAULT_TARGET_FPS,
};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
