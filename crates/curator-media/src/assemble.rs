//! Assemble the motion intervals of a video into one clip.
//!
//! # Strategy
//!
//! 1. Map each interval to a frame range `[floor(start * fps), ceil(end * fps))`
//! 2. Extract each range frame-accurately with `trim`/`atrim`, re-encoding
//!    at the source frame rate so every sub-clip shares codec parameters
//! 3. Join the sub-clips with the concat demuxer using stream copy
//!
//! The joined file is written next to the destination and renamed into
//! place only after ffprobe confirms it has a positive duration. Sub-clips
//! live in a temporary directory that is removed on every exit path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use curator_models::{EncodingConfig, MotionTrace};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{persist_over, temp_file_beside};
use crate::probe::{probe_video, VideoInfo};

/// Tolerance for float error when converting seconds to frame indices.
const FRAME_EPSILON: f64 = 1e-6;

/// Frame range extracted for one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPlan {
    /// First frame (inclusive).
    pub start_frame: u64,
    /// Last frame (exclusive).
    pub end_frame: u64,
}

impl SegmentPlan {
    /// Number of frames in the segment.
    pub fn frames(&self) -> u64 {
        self.end_frame - self.start_frame
    }

    /// Segment start in seconds.
    pub fn start_secs(&self, fps: f64) -> f64 {
        self.start_frame as f64 / fps
    }

    /// Segment end in seconds.
    pub fn end_secs(&self, fps: f64) -> f64 {
        self.end_frame as f64 / fps
    }

    /// Segment duration in seconds.
    pub fn duration_secs(&self, fps: f64) -> f64 {
        self.frames() as f64 / fps
    }
}

/// Map a trace to non-empty, non-overlapping frame ranges.
pub fn plan_segments(trace: &MotionTrace, fps: f64) -> Vec<SegmentPlan> {
    let mut plans: Vec<SegmentPlan> = Vec::with_capacity(trace.len());
    let mut covered_to = 0u64;

    for interval in trace.iter() {
        let start_frame = ((interval.start() * fps + FRAME_EPSILON).floor() as u64).max(covered_to);
        let end_frame = (interval.end() * fps - FRAME_EPSILON).ceil().max(0.0) as u64;

        if end_frame <= start_frame {
            continue;
        }

        covered_to = end_frame;
        plans.push(SegmentPlan {
            start_frame,
            end_frame,
        });
    }

    plans
}

/// Total duration of planned segments in seconds.
pub fn planned_duration(plans: &[SegmentPlan], fps: f64) -> f64 {
    plans.iter().map(|p| p.duration_secs(fps)).sum()
}

/// Options for clip assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembleOptions {
    /// Frame rate of the (constant frame rate) source.
    pub fps: f64,
    /// Whether the source has an audio stream to carry over.
    pub has_audio: bool,
    /// Output codec settings.
    pub encoding: EncodingConfig,
}

impl AssembleOptions {
    /// Options matching a probed source.
    pub fn for_source(info: &VideoInfo, encoding: EncodingConfig) -> Self {
        Self {
            fps: info.fps,
            has_audio: info.has_audio,
            encoding,
        }
    }

    /// Validate the options.
    pub fn validate(&self) -> MediaResult<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(MediaError::invalid_config(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        self.encoding.validate().map_err(MediaError::invalid_config)
    }
}

/// Result of clip assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyOutcome {
    /// The clip was written.
    Written {
        /// Destination path.
        path: PathBuf,
        /// Duration measured by ffprobe.
        duration_secs: f64,
        /// Number of segments joined.
        segments: usize,
    },
    /// The trace covered no frames; nothing was written.
    NothingToOutput,
}

/// Build the extraction command for one segment.
pub fn build_extract_command(
    source: &Path,
    output: &Path,
    plan: &SegmentPlan,
    options: &AssembleOptions,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(source, output).map("0:v:0").video_filter(format!(
        "trim=start_frame={}:end_frame={},setpts=PTS-STARTPTS",
        plan.start_frame, plan.end_frame
    ));

    let cmd = if options.has_audio {
        cmd.map("0:a:0").audio_filter(format!(
            "atrim=start={:.6}:end={:.6},asetpts=PTS-STARTPTS",
            plan.start_secs(options.fps),
            plan.end_secs(options.fps)
        ))
    } else {
        cmd.no_audio()
    };

    cmd.constant_frame_rate(options.fps)
        .encoding(&options.encoding, options.has_audio)
        .format("mp4")
}

/// Build the concat demuxer command joining the listed segments.
pub fn build_concat_command(list: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(list, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .codec_copy()
        .faststart()
        .format("mp4")
}

/// Concat demuxer list for `paths`.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Write the footage inside `trace` from `source` to `output`.
///
/// `source` must be constant frame rate at `options.fps`. On any failure,
/// including cancellation, nothing is left at `output`.
pub async fn assemble_clip(
    source: &Path,
    trace: &MotionTrace,
    output: &Path,
    options: &AssembleOptions,
    runner: &FfmpegRunner,
) -> MediaResult<AssemblyOutcome> {
    options.validate()?;

    let plans = plan_segments(trace, options.fps);
    if plans.is_empty() {
        debug!(intervals = trace.len(), "No frames to assemble");
        return Ok(AssemblyOutcome::NothingToOutput);
    }

    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    info!(
        source = %source.display(),
        output = %output.display(),
        segments = plans.len(),
        planned_secs = planned_duration(&plans, options.fps),
        "Assembling motion clip"
    );

    let work_dir = tempfile::Builder::new()
        .prefix("curator-segments-")
        .tempdir()?;
    let mut segment_paths = Vec::with_capacity(plans.len());

    for (i, plan) in plans.iter().enumerate() {
        if runner.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let seg_path = work_dir.path().join(format!("seg_{:04}.mp4", i));

        debug!(
            segment = i,
            start_frame = plan.start_frame,
            end_frame = plan.end_frame,
            "Extracting segment"
        );

        let cmd = build_extract_command(source, &seg_path, plan, options);
        runner.run(&cmd).await.map_err(|e| match e {
            MediaError::FfmpegFailed {
                message,
                stderr,
                exit_code,
            } => MediaError::ffmpeg_failed(
                format!("Segment {} extraction failed: {}", i, message),
                stderr,
                exit_code,
            ),
            other => other,
        })?;

        segment_paths.push(seg_path);
    }

    let list_path = work_dir.path().join("concat.txt");
    tokio::fs::write(&list_path, concat_list(&segment_paths)).await?;

    let temp = temp_file_beside(output, ".assemble-")?;
    runner
        .run(&build_concat_command(&list_path, temp.path()))
        .await?;

    let info = probe_video(temp.path()).await.map_err(|e| {
        MediaError::ffmpeg_failed(
            format!("Assembled clip is unreadable: {}", e),
            e.stderr().map(str::to_string),
            None,
        )
    })?;

    if !(info.duration > 0.0) {
        return Err(MediaError::ffmpeg_failed(
            "Assembled clip has no duration",
            None,
            None,
        ));
    }

    persist_over(temp, output)?;

    info!(
        output = %output.display(),
        duration_secs = info.duration,
        segments = plans.len(),
        "Motion clip assembled"
    );

    Ok(AssemblyOutcome::Written {
        path: output.to_path_buf(),
        duration_secs: info.duration,
        segments: plans.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_models::MotionInterval;

    fn trace(pairs: &[(f64, f64)]) -> MotionTrace {
        pairs
            .iter()
            .map(|(s, e)| MotionInterval::new(*s, *e).unwrap())
            .collect()
    }

    fn options(has_audio: bool) -> AssembleOptions {
        AssembleOptions {
            fps: 30.0,
            has_audio,
            encoding: EncodingConfig::default(),
        }
    }

    #[test]
    fn test_plan_frame_ranges() {
        let plans = plan_segments(&trace(&[(0.0, 59.0 / 30.0), (4.0, 179.0 / 30.0)]), 30.0);
        assert_eq!(
            plans,
            vec![
                SegmentPlan {
                    start_frame: 0,
                    end_frame: 59
                },
                SegmentPlan {
                    start_frame: 120,
                    end_frame: 179
                },
            ]
        );
        assert!((planned_duration(&plans, 30.0) - 118.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_rounds_outward() {
        let plans = plan_segments(&trace(&[(1.01, 1.99)]), 30.0);
        assert_eq!(
            plans,
            vec![SegmentPlan {
                start_frame: 30,
                end_frame: 60
            }]
        );
    }

    #[test]
    fn test_plan_skips_empty_intervals() {
        assert!(plan_segments(&trace(&[(2.0, 2.0)]), 30.0).is_empty());
        assert!(plan_segments(&MotionTrace::new(), 30.0).is_empty());
    }

    #[test]
    fn test_plan_never_overlaps() {
        let plans = plan_segments(&trace(&[(0.0, 2.0), (1.0, 3.0)]), 30.0);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].start_frame, 60);
        assert_eq!(plans[1].end_frame, 90);
    }

    #[test]
    fn test_extract_command_with_audio() {
        let plan = SegmentPlan {
            start_frame: 120,
            end_frame: 180,
        };
        let args = build_extract_command(
            Path::new("src.mp4"),
            Path::new("seg.mp4"),
            &plan,
            &options(true),
        )
        .build_args();

        assert!(args.windows(2).any(|w| w[0] == "-vf"
            && w[1] == "trim=start_frame=120:end_frame=180,setpts=PTS-STARTPTS"));
        assert!(args.windows(2).any(|w| w[0] == "-af"
            && w[1] == "atrim=start=4.000000:end=6.000000,asetpts=PTS-STARTPTS"));
        assert!(args.windows(2).any(|w| w[0] == "-r" && w[1] == "30"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(!args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_extract_command_without_audio() {
        let plan = SegmentPlan {
            start_frame: 0,
            end_frame: 30,
        };
        let args = build_extract_command(
            Path::new("src.mp4"),
            Path::new("seg.mp4"),
            &plan,
            &options(false),
        )
        .build_args();

        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-af".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn test_concat_command() {
        let args = build_concat_command(Path::new("list.txt"), Path::new("out.mp4")).build_args();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let concat_pos = args.iter().position(|a| a == "concat").unwrap();

        assert!(concat_pos < input_pos);
        assert!(args.windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[tokio::test]
    async fn test_empty_trace_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");

        let outcome = assemble_clip(
            &dir.path().join("missing.mp4"),
            &MotionTrace::new(),
            &output,
            &options(false),
            &FfmpegRunner::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, AssemblyOutcome::NothingToOutput);
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_fps_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut opts = options(false);
        opts.fps = 0.0;

        let err = assemble_clip(
            &dir.path().join("src.mp4"),
            &trace(&[(0.0, 1.0)]),
            &dir.path().join("out.mp4"),
            &opts,
            &FfmpegRunner::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::InvalidConfig(_)));
    }
}
