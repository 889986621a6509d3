//! Constant frame rate normalization.
//!
//! Everything downstream converts frame indices to timestamps with
//! `index / fps`, which only holds for constant frame rate input. Phone and
//! camera recordings are frequently variable frame rate, so every source is
//! resampled to a fixed rate (duplicating or dropping frames) before
//! segmentation.
//!
//! The rewrite is atomic: FFmpeg writes to a temporary file beside the
//! destination, and the destination is only replaced after FFmpeg exits
//! successfully and the result is non-empty.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use curator_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{persist_over, temp_file_beside};

/// Default normalization frame rate.
pub const DEFAULT_TARGET_FPS: u32 = 30;

/// Options for frame rate normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Output frame rate
    pub target_fps: u32,
    /// Codec settings for the rewritten file
    pub encoding: EncodingConfig,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            encoding: EncodingConfig::default(),
        }
    }
}

impl NormalizeOptions {
    /// Builder-style setter for the target frame rate.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Validate the options.
    pub fn validate(&self) -> MediaResult<()> {
        if self.target_fps == 0 {
            return Err(MediaError::invalid_config("target_fps must be greater than zero"));
        }
        self.encoding.validate().map_err(MediaError::invalid_config)
    }
}

/// Build the FFmpeg command that resamples `input` to constant frame rate.
pub fn build_normalize_command(
    input: &Path,
    output: &Path,
    options: &NormalizeOptions,
) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .map("0:v:0")
        .map("0:a?")
        .video_filter(format!("fps={}", options.target_fps))
        .constant_frame_rate(options.target_fps as f64)
        .encoding(&options.encoding, true)
        .faststart()
        .format("mp4")
}

/// Write a constant frame rate copy of `input` to `output`.
///
/// `output` may equal `input`, in which case the source is replaced only on
/// success. On failure no file is left at `output` (or the original remains).
pub async fn normalize_frame_rate(
    input: &Path,
    output: &Path,
    options: &NormalizeOptions,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    options.validate()?;

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        target_fps = options.target_fps,
        "Normalizing to constant frame rate"
    );

    let temp = temp_file_beside(output, ".normalize-")?;
    let cmd = build_normalize_command(input, temp.path(), options);

    runner
        .run_with_progress(&cmd, |progress| {
            debug!(
                frame = progress.frame,
                out_time_ms = progress.out_time_ms,
                speed = progress.speed,
                "Normalize progress"
            );
        })
        .await?;

    let written = tokio::fs::metadata(temp.path()).await?.len();
    if written == 0 {
        return Err(MediaError::ffmpeg_failed(
            "FFmpeg produced an empty normalized file",
            None,
            Some(0),
        ));
    }

    persist_over(temp, output)?;

    info!(
        output = %output.display(),
        bytes = written,
        "Frame rate normalization complete"
    );

    Ok(())
}

/// Replace `path` with its constant frame rate rewrite.
pub async fn normalize_in_place(
    path: &Path,
    options: &NormalizeOptions,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    normalize_frame_rate(path, path, options, runner).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_options() {
        let options = NormalizeOptions::default();
        assert_eq!(options.target_fps, 30);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_fps_rejected() {
        let options = NormalizeOptions::default().with_target_fps(0);
        assert!(matches!(options.validate(), Err(MediaError::InvalidConfig(_))));
    }

    #[test]
    fn test_normalize_command() {
        let cmd = build_normalize_command(
            &PathBuf::from("in.mov"),
            &PathBuf::from("out.mp4"),
            &NormalizeOptions::default().with_target_fps(25),
        );
        let args = cmd.build_args();

        assert!(args.windows(2).any(|w| w[0] == "-vf" && w[1] == "fps=25"));
        assert!(args.windows(2).any(|w| w[0] == "-vsync" && w[1] == "cfr"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:a?"));
        assert!(args.windows(2).any(|w| w[0] == "-movflags" && w[1] == "+faststart"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "mp4"));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.mp4");
        let output = dir.path().join("out.mp4");

        let err = normalize_frame_rate(
            &missing,
            &output,
            &NormalizeOptions::default(),
            &FfmpegRunner::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!output.exists());
    }
}
