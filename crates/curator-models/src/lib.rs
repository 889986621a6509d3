//! Shared data models for the motion curation engine.
//!
//! This crate provides Serde-serializable types for:
//! - Motion intervals and traces
//! - Curation outcomes and output clips
//! - Output encoding configuration
//! - Storage key naming for delivered clips

pub mod encoding;
pub mod interval;
pub mod naming;
pub mod outcome;

// Re-export common types
pub use encoding::EncodingConfig;
pub use interval::{IntervalError, MotionInterval, MotionTrace};
pub use naming::{unique_clip_key, DEFAULT_CLIP_PREFIX};
pub use outcome::{CurationOutcome, OutputClip};
