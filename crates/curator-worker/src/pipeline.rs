//! Curation pipeline: normalize, segment, merge, assemble and deliver.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::watch;
use tracing::{debug, Instrument};

use curator_media::{
    assemble_clip, cancel_requested, detect_motion, merge_intervals, normalize_frame_rate,
    plan_segments, planned_duration, probe_video, AssembleOptions, AssemblyOutcome, FfmpegRunner,
    MediaError, MotionAnalysis, VideoInfo,
};
use curator_models::{unique_clip_key, CurationOutcome, MotionTrace, OutputClip};

use crate::config::CuratorConfig;
use crate::delivery::{ClipSink, DeliveredClip};
use crate::error::{CurationError, CurationResult, Stage};
use crate::logging::RunLogger;
use crate::metrics;

/// File name of the normalized copy inside a run directory.
const NORMALIZED_FILE: &str = "normalized.mp4";

/// Segmentation results for one source, without assembly.
#[derive(Debug, Clone, Serialize)]
pub struct MotionReport {
    pub source: PathBuf,
    pub fps: f64,
    pub total_frames: u64,
    pub sampled_frames: u64,
    pub motion_frames: u64,
    pub source_duration_secs: f64,
    /// Intervals as emitted by the segmenter
    pub raw: MotionTrace,
    /// Intervals after merging
    pub merged: MotionTrace,
    /// Duration the assembled clip would have
    pub projected_duration_secs: f64,
}

/// Result of curating and delivering one source.
#[derive(Debug, Clone, Serialize)]
pub struct CurationReport {
    pub run_id: String,
    pub source: PathBuf,
    pub outcome: CurationOutcome,
    pub delivered: Option<DeliveredClip>,
    pub elapsed_secs: f64,
}

/// Normalized and segmented source, kept alive by its run directory.
struct Segmented {
    _run_dir: TempDir,
    normalized: PathBuf,
    info: VideoInfo,
    analysis: MotionAnalysis,
    merged: MotionTrace,
}

/// Runs the curation stages for one source at a time.
#[derive(Debug, Clone)]
pub struct CurationPipeline {
    config: CuratorConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl CurationPipeline {
    /// Create a pipeline after validating `config`.
    pub fn new(config: CuratorConfig) -> CurationResult<Self> {
        config.validate().map_err(CurationError::Config)?;
        Ok(Self {
            config,
            cancel_rx: None,
        })
    }

    /// Stop work when the signal turns `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.config.ffmpeg_timeout {
            runner = runner.with_timeout(timeout.as_secs());
        }
        if let Some(cancel_rx) = &self.cancel_rx {
            runner = runner.with_cancel(cancel_rx.clone());
        }
        runner
    }

    fn ensure_not_cancelled(&self) -> CurationResult<()> {
        if cancel_requested(self.cancel_rx.as_ref()) {
            return Err(CurationError::Cancelled);
        }
        Ok(())
    }

    async fn run_dir(&self) -> CurationResult<TempDir> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix("curator-run-")
            .tempdir_in(&self.config.work_dir)?;
        Ok(dir)
    }

    /// Probe, normalize, segment and merge `source`.
    async fn segment(&self, source: &Path, logger: &RunLogger) -> CurationResult<Segmented> {
        let runner = self.runner();

        let started = Instant::now();
        let source_info = probe_video(source)
            .await
            .map_err(|e| CurationError::from_media(Stage::Probe, source, e))?;
        if source_info.duration <= 0.0 || source_info.width == 0 || source_info.height == 0 {
            return Err(CurationError::from_media(
                Stage::Probe,
                source,
                MediaError::invalid_video("Video has no duration or no picture"),
            ));
        }
        debug!(
            duration = source_info.duration,
            fps = source_info.fps,
            width = source_info.width,
            height = source_info.height,
            has_audio = source_info.has_audio,
            "Probed source"
        );
        finish_stage(logger, Stage::Probe, started);

        self.ensure_not_cancelled()?;
        let started = Instant::now();
        let run_dir = self.run_dir().await?;
        let normalized = run_dir.path().join(NORMALIZED_FILE);
        normalize_frame_rate(source, &normalized, &self.config.normalize_options(), &runner)
            .await
            .map_err(|e| CurationError::from_media(Stage::Normalize, source, e))?;
        let info = probe_video(&normalized)
            .await
            .map_err(|e| CurationError::from_media(Stage::Normalize, source, e))?;
        finish_stage(logger, Stage::Normalize, started);

        self.ensure_not_cancelled()?;
        let started = Instant::now();
        let analysis = detect_motion(
            &normalized,
            &info,
            &self.config.motion,
            self.cancel_rx.as_ref(),
        )
        .await
        .map_err(|e| CurationError::from_media(Stage::Segment, source, e))?;
        let merged = merge_intervals(&analysis.trace, self.config.merge_gap_secs);
        metrics::record_intervals(analysis.trace.len(), merged.len());
        logger.log_progress(&format!(
            "{} motion intervals, {} after merging",
            analysis.trace.len(),
            merged.len()
        ));
        finish_stage(logger, Stage::Segment, started);

        Ok(Segmented {
            _run_dir: run_dir,
            normalized,
            info,
            analysis,
            merged,
        })
    }

    /// Segment `source` and report the intervals without writing a clip.
    pub async fn analyze(&self, source: &Path) -> CurationResult<MotionReport> {
        let logger = RunLogger::new(source);
        let span = logger.create_span();

        async {
            logger.log_start("analysis only");
            let result = self.segment(source, &logger).await;
            let segmented = observe_failure(&logger, result)?;

            let fps = segmented.analysis.fps;
            let projected = planned_duration(&plan_segments(&segmented.merged, fps), fps);

            logger.log_completion(&format!("projected {:.2}s of output", projected));

            Ok(MotionReport {
                source: source.to_path_buf(),
                fps,
                total_frames: segmented.analysis.total_frames,
                sampled_frames: segmented.analysis.sampled_frames,
                motion_frames: segmented.analysis.motion_frames,
                source_duration_secs: segmented.analysis.source_duration(),
                raw: segmented.analysis.trace,
                merged: segmented.merged,
                projected_duration_secs: projected,
            })
        }
        .instrument(span)
        .await
    }

    /// Curate `source` into `destination`.
    ///
    /// Returns `NoMotion` without creating `destination` when nothing
    /// moves. On failure nothing is left at `destination`.
    pub async fn curate(&self, source: &Path, destination: &Path) -> CurationResult<CurationOutcome> {
        let logger = RunLogger::new(source);
        self.curate_logged(source, destination, &logger).await
    }

    async fn curate_logged(
        &self,
        source: &Path,
        destination: &Path,
        logger: &RunLogger,
    ) -> CurationResult<CurationOutcome> {
        let span = logger.create_span();

        async {
            logger.log_start(&format!("writing to {}", destination.display()));
            let result = self.curate_inner(source, destination, logger).await;
            let outcome = observe_failure(logger, result)?;

            match &outcome {
                CurationOutcome::Curated(clip) => {
                    metrics::record_output(clip.duration_secs);
                    logger.log_completion(&format!(
                        "{:.2}s clip from {} intervals",
                        clip.duration_secs, clip.interval_count
                    ));
                }
                CurationOutcome::NoMotion {
                    source_duration_secs,
                } => {
                    logger.log_completion(&format!(
                        "no motion in {:.2}s of footage",
                        source_duration_secs
                    ));
                }
            }
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn curate_inner(
        &self,
        source: &Path,
        destination: &Path,
        logger: &RunLogger,
    ) -> CurationResult<CurationOutcome> {
        let segmented = self.segment(source, logger).await?;
        let source_duration_secs = segmented.analysis.source_duration();

        self.ensure_not_cancelled()?;
        let started = Instant::now();

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = AssembleOptions::for_source(&segmented.info, self.config.encoding.clone());
        let assembled = assemble_clip(
            &segmented.normalized,
            &segmented.merged,
            destination,
            &options,
            &self.runner(),
        )
        .await
        .map_err(|e| CurationError::from_media(Stage::Assemble, source, e))?;
        finish_stage(logger, Stage::Assemble, started);

        let outcome = match assembled {
            AssemblyOutcome::Written {
                path,
                duration_secs,
                segments,
            } => CurationOutcome::Curated(OutputClip {
                path,
                duration_secs,
                interval_count: segments,
                fps: options.fps,
            }),
            AssemblyOutcome::NothingToOutput => CurationOutcome::NoMotion {
                source_duration_secs,
            },
        };

        metrics::record_video(outcome.label(), source_duration_secs);
        Ok(outcome)
    }

    /// Curate `source` and hand the clip to `sink` under a unique key.
    pub async fn process(&self, source: &Path, sink: &dyn ClipSink) -> CurationResult<CurationReport> {
        let started = Instant::now();
        let logger = RunLogger::new(source);

        let out_dir = self.run_dir().await?;
        let destination = out_dir.path().join("curated.mp4");

        let outcome = self.curate_logged(source, &destination, &logger).await?;

        let (outcome, delivered) = match outcome {
            CurationOutcome::Curated(mut clip) => {
                self.ensure_not_cancelled()?;
                let key = unique_clip_key(&self.config.clip_prefix, &clip_file_name(source));

                let deliver_started = Instant::now();
                let result = sink.deliver(&clip.path, &key).await;
                metrics::record_delivery(sink.name(), result.is_ok());
                let delivered = observe_failure(&logger, result)?;
                finish_stage(&logger, Stage::Deliver, deliver_started);

                clip.path = PathBuf::from(&delivered.location);
                (CurationOutcome::Curated(clip), Some(delivered))
            }
            no_motion => (no_motion, None),
        };

        Ok(CurationReport {
            run_id: logger.run_id().to_string(),
            source: source.to_path_buf(),
            outcome,
            delivered,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

/// Log and count a failed run, passing the result through.
fn observe_failure<T>(logger: &RunLogger, result: CurationResult<T>) -> CurationResult<T> {
    if let Err(e) = &result {
        match e {
            CurationError::Cancelled => logger.log_warning("cancelled"),
            _ => logger.log_error(&e.to_string()),
        }
        metrics::record_failure(e.kind(), e.stage().map(|s| s.as_str()));
    }
    result
}

fn finish_stage(logger: &RunLogger, stage: Stage, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    metrics::record_stage(stage.as_str(), elapsed);
    logger.log_stage(stage.as_str(), elapsed);
}

/// Name used to derive the delivery key; clips are always MP4.
fn clip_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("clip");
    format!("{}.mp4", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_models::MotionInterval;
    use std::time::Duration;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = CuratorConfig::default();
        config.target_fps = 0;
        let err = CurationPipeline::new(config).unwrap_err();
        assert!(matches!(err, CurationError::Config(_)));
    }

    #[test]
    fn test_runner_carries_cancel_signal() {
        let (tx, rx) = watch::channel(false);
        let mut config = CuratorConfig::default();
        config.ffmpeg_timeout = Some(Duration::from_secs(30));

        let pipeline = CurationPipeline::new(config).unwrap().with_cancel(rx);
        let runner = pipeline.runner();
        assert!(!runner.is_cancelled());
        assert!(pipeline.ensure_not_cancelled().is_ok());

        tx.send(true).unwrap();
        assert!(runner.is_cancelled());
        assert!(matches!(
            pipeline.ensure_not_cancelled(),
            Err(CurationError::Cancelled)
        ));
    }

    #[test]
    fn test_clip_file_name() {
        assert_eq!(clip_file_name(Path::new("/in/cam1.mov")), "cam1.mp4");
        assert_eq!(clip_file_name(Path::new("footage")), "footage.mp4");
        assert_eq!(clip_file_name(Path::new("/")), "clip.mp4");
    }

    #[tokio::test]
    async fn test_missing_source_is_invalid_input() {
        let work = TempDir::new().unwrap();
        let mut config = CuratorConfig::default();
        config.work_dir = work.path().join("work");

        let pipeline = CurationPipeline::new(config).unwrap();
        let source = work.path().join("missing.mp4");
        let destination = work.path().join("out.mp4");

        let err = pipeline.curate(&source, &destination).await.unwrap_err();
        assert!(matches!(err, CurationError::InvalidInput { .. }));
        assert!(!destination.exists());
    }

    #[test]
    fn test_reports_serialize() {
        let trace = MotionTrace::from_ordered(vec![MotionInterval::new(1.0, 2.0).unwrap()]).unwrap();
        let report = MotionReport {
            source: PathBuf::from("in.mp4"),
            fps: 30.0,
            total_frames: 300,
            sampled_frames: 300,
            motion_frames: 30,
            source_duration_secs: 10.0,
            raw: trace.clone(),
            merged: trace,
            projected_duration_secs: 1.0,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_frames"], 300);
        assert!(json["merged"].is_array());

        let report = CurationReport {
            run_id: "run".to_string(),
            source: PathBuf::from("in.mp4"),
            outcome: CurationOutcome::NoMotion {
                source_duration_secs: 10.0,
            },
            delivered: None,
            elapsed_secs: 0.5,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["outcome"], "no_motion");
        assert!(json["delivered"].is_null());
    }
}
