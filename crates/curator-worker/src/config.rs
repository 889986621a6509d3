//! Curator configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use curator_media::{MotionConfig, NormalizeOptions, DEFAULT_MERGE_GAP_SECS, DEFAULT_TARGET_FPS};
use curator_models::{EncodingConfig, DEFAULT_CLIP_PREFIX};

/// Curator configuration.
#[derive(Debug, Clone)]
pub struct CuratorConfig {
    /// Constant frame rate every source is normalized to
    pub target_fps: u32,
    /// Motion detection and segmentation settings
    pub motion: MotionConfig,
    /// Intervals separated by at most this many seconds are merged
    pub merge_gap_secs: f64,
    /// Codec settings for normalized and curated files
    pub encoding: EncodingConfig,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Directory curated clips are delivered to
    pub output_dir: PathBuf,
    /// Key prefix for delivered clips
    pub clip_prefix: String,
    /// Per-invocation FFmpeg timeout
    pub ffmpeg_timeout: Option<Duration>,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            motion: MotionConfig::default(),
            merge_gap_secs: DEFAULT_MERGE_GAP_SECS,
            encoding: EncodingConfig::default(),
            work_dir: std::env::temp_dir().join("curator"),
            output_dir: PathBuf::from("curated"),
            clip_prefix: DEFAULT_CLIP_PREFIX.to_string(),
            ffmpeg_timeout: None,
        }
    }
}

/// Parse an environment variable, ignoring missing or malformed values.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a boolean environment variable ("1", "true", "yes", "on").
fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl CuratorConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let motion_defaults = defaults.motion.clone();
        let background = motion_defaults.background.clone();

        let video_codec = std::env::var("CURATOR_VIDEO_CODEC")
            .unwrap_or_else(|_| defaults.encoding.codec.clone());
        let audio_codec = std::env::var("CURATOR_AUDIO_CODEC")
            .unwrap_or_else(|_| defaults.encoding.audio_codec.clone());

        Self {
            target_fps: env_parse("CURATOR_TARGET_FPS").unwrap_or(defaults.target_fps),
            motion: MotionConfig {
                frame_stride: env_parse("CURATOR_FRAME_STRIDE")
                    .unwrap_or(motion_defaults.frame_stride),
                min_blob_area: env_parse("CURATOR_MIN_MOTION_AREA")
                    .unwrap_or(motion_defaults.min_blob_area),
                no_motion_frames_required: env_parse("CURATOR_NO_MOTION_FRAMES")
                    .unwrap_or(motion_defaults.no_motion_frames_required),
                background: background
                    .clone()
                    .with_history(env_parse("CURATOR_BG_HISTORY").unwrap_or(background.history))
                    .with_var_threshold(
                        env_parse("CURATOR_BG_VAR_THRESHOLD").unwrap_or(background.var_threshold),
                    )
                    .with_detect_shadows(
                        env_flag("CURATOR_DETECT_SHADOWS").unwrap_or(background.detect_shadows),
                    ),
                ..motion_defaults
            },
            merge_gap_secs: env_parse("CURATOR_MERGE_GAP_SECS").unwrap_or(defaults.merge_gap_secs),
            encoding: defaults.encoding.with_codecs(video_codec, audio_codec),
            work_dir: std::env::var("CURATOR_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("CURATOR_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            clip_prefix: std::env::var("CURATOR_CLIP_PREFIX").unwrap_or(defaults.clip_prefix),
            ffmpeg_timeout: env_parse::<u64>("CURATOR_FFMPEG_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_fps == 0 {
            return Err("target_fps must be greater than zero".to_string());
        }
        if !self.merge_gap_secs.is_finite() || self.merge_gap_secs < 0.0 {
            return Err(format!(
                "merge_gap_secs must be a non-negative number, got {}",
                self.merge_gap_secs
            ));
        }
        if self.clip_prefix.contains("..") {
            return Err("clip_prefix must not contain '..'".to_string());
        }
        self.encoding.validate()?;
        self.motion.validate().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Normalizer options derived from this configuration.
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            target_fps: self.target_fps,
            encoding: self.encoding.clone(),
        }
    }
}
