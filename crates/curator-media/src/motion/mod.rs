//! Motion segmentation.
//!
//! Frames are decoded one at a time, checked against a running background
//! model and fed to a two-state segmenter.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Gray frames  │───►│ Blur + MOG   │───►│ Threshold,   │───►│ Segmenter    │
//! │ (FFmpeg pipe)│    │ background   │    │ dilate, blobs│    │ (intervals)  │
//! └──────────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//! ```

mod background;
mod config;
mod mask;
mod segmenter;

pub use background::{BackgroundModel, BACKGROUND, FOREGROUND};
pub use config::{BackgroundModelConfig, MotionConfig};
pub use mask::{binarize, blob_areas, dilate_square, smooth, FrameMotion, MotionDetector};
pub use segmenter::{MotionSegmenter, SegmenterState};

use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use curator_models::MotionTrace;

use crate::command::cancel_requested;
use crate::error::{MediaError, MediaResult};
use crate::frames::GrayFrameReader;
use crate::probe::VideoInfo;

/// Result of segmenting one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionAnalysis {
    /// Raw (unmerged) motion intervals.
    pub trace: MotionTrace,
    /// Frames decoded.
    pub total_frames: u64,
    /// Frames run through the detector (after stride).
    pub sampled_frames: u64,
    /// Sampled frames classified as motion.
    pub motion_frames: u64,
    /// Frame rate used for timestamps.
    pub fps: f64,
}

impl MotionAnalysis {
    /// Duration of the decoded stream in seconds.
    pub fn source_duration(&self) -> f64 {
        self.total_frames as f64 / self.fps
    }
}

/// Synchronous frame-by-frame motion analysis.
pub struct MotionAnalyzer {
    detector: MotionDetector,
    segmenter: MotionSegmenter,
    stride: u64,
    fps: f64,
    frame_index: u64,
    sampled_frames: u64,
    motion_frames: u64,
}

impl MotionAnalyzer {
    /// Create an analyzer for a stream at `fps`.
    pub fn new(fps: f64, config: &MotionConfig) -> MediaResult<Self> {
        Ok(Self {
            detector: MotionDetector::new(config)?,
            segmenter: MotionSegmenter::new(fps, config)?,
            stride: config.frame_stride as u64,
            fps,
            frame_index: 0,
            sampled_frames: 0,
            motion_frames: 0,
        })
    }

    /// Feed the next frame. Frames off the stride are counted but skipped.
    pub fn push_frame(&mut self, frame: &GrayImage) -> MediaResult<Option<FrameMotion>> {
        let index = self.frame_index;
        self.frame_index += 1;

        if index % self.stride != 0 {
            return Ok(None);
        }

        let motion = self.detector.detect(frame)?;
        self.sampled_frames += 1;
        if motion.motion {
            self.motion_frames += 1;
        }
        self.segmenter.ingest(index, motion.motion)?;

        Ok(Some(motion))
    }

    /// Close the trace at the last pushed frame.
    pub fn finish(self) -> MediaResult<MotionAnalysis> {
        if self.frame_index == 0 {
            return Err(MediaError::invalid_video("No decodable frames"));
        }

        let trace = self.segmenter.finish(self.frame_index)?;

        Ok(MotionAnalysis {
            trace,
            total_frames: self.frame_index,
            sampled_frames: self.sampled_frames,
            motion_frames: self.motion_frames,
            fps: self.fps,
        })
    }
}

/// Segment a constant frame rate video into motion intervals.
///
/// Frames are streamed from FFmpeg; only one frame is held in memory.
/// Cancellation is checked between frames.
pub async fn detect_motion(
    path: &Path,
    info: &VideoInfo,
    config: &MotionConfig,
    cancel_rx: Option<&watch::Receiver<bool>>,
) -> MediaResult<MotionAnalysis> {
    let mut analyzer = MotionAnalyzer::new(info.fps, config)?;
    let mut reader = GrayFrameReader::open(path, info.width, info.height).await?;

    debug!(
        path = %path.display(),
        fps = info.fps,
        width = info.width,
        height = info.height,
        stride = config.frame_stride,
        "Starting motion detection"
    );

    loop {
        if cancel_requested(cancel_rx) {
            reader.abort().await;
            return Err(MediaError::Cancelled);
        }

        let frame = match reader.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                reader.abort().await;
                return Err(e);
            }
        };

        if let Err(e) = analyzer.push_frame(&frame) {
            reader.abort().await;
            return Err(e);
        }
    }

    reader.finish().await?;
    let analysis = analyzer.finish()?;

    info!(
        path = %path.display(),
        total_frames = analysis.total_frames,
        motion_frames = analysis.motion_frames,
        intervals = analysis.trace.len(),
        "Motion detection complete"
    );

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    const SIZE: u32 = 64;

    fn frame_with_box(x0: Option<u32>) -> GrayImage {
        let mut img = GrayImage::new(SIZE, SIZE);
        if let Some(x0) = x0 {
            for y in 20..40 {
                for x in x0..x0 + 20 {
                    img.put_pixel(x, y, Luma([255]));
                }
            }
        }
        img
    }

    fn config() -> MotionConfig {
        MotionConfig::default().with_min_blob_area(300)
    }

    fn analyze(frames: impl Iterator<Item = GrayImage>, config: &MotionConfig) -> MotionAnalysis {
        let mut analyzer = MotionAnalyzer::new(30.0, config).unwrap();
        for frame in frames {
            analyzer.push_frame(&frame).unwrap();
        }
        analyzer.finish().unwrap()
    }

    /// Still background, a box sliding across frames `motion`, still again.
    fn scene(total: u64, motion: std::ops::Range<u64>) -> impl Iterator<Item = GrayImage> {
        (0..total).map(move |i| {
            if motion.contains(&i) {
                frame_with_box(Some(((i - motion.start) * 2 % 40) as u32))
            } else {
                frame_with_box(None)
            }
        })
    }

    #[test]
    fn test_static_video_has_no_motion() {
        let analysis = analyze(scene(90, 0..0), &config());
        assert!(analysis.trace.is_empty());
        assert_eq!(analysis.total_frames, 90);
        assert_eq!(analysis.sampled_frames, 90);
        assert_eq!(analysis.motion_frames, 0);
        assert!((analysis.source_duration() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_box_detected() {
        let analysis = analyze(scene(150, 30..60), &config());

        assert_eq!(analysis.trace.len(), 1);
        let interval = analysis.trace.as_slice()[0];
        assert!((interval.start() - 1.0).abs() < 2.0 / 30.0);
        assert!(interval.end() > interval.start());
        assert!(interval.end() <= 2.0 + 1.0 / 30.0);
    }

    #[test]
    fn test_stride_skips_frames() {
        let analysis = analyze(scene(90, 0..0), &config().with_frame_stride(3));
        assert_eq!(analysis.total_frames, 90);
        assert_eq!(analysis.sampled_frames, 30);
    }

    #[test]
    fn test_no_frames_is_an_error() {
        let analyzer = MotionAnalyzer::new(30.0, &config()).unwrap();
        let err = analyzer.finish().unwrap_err();
        assert!(err.is_input_error());
    }
}
