//! Curation metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const VIDEOS_TOTAL: &str = "curator_videos_total";
    pub const FAILURES_TOTAL: &str = "curator_failures_total";
    pub const MOTION_INTERVALS: &str = "curator_motion_intervals";
    pub const OUTPUT_SECONDS: &str = "curator_output_seconds";
    pub const SOURCE_SECONDS: &str = "curator_source_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "curator_stage_seconds";
    pub const DELIVERIES_TOTAL: &str = "curator_deliveries_total";
}

/// Record a finished video with its outcome label.
pub fn record_video(outcome: &str, source_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::VIDEOS_TOTAL, &labels).increment(1);
    histogram!(names::SOURCE_SECONDS).record(source_secs);
}

/// Record a failed video.
pub fn record_failure(kind: &str, stage: Option<&str>) {
    let labels = [
        ("kind", kind.to_string()),
        ("stage", stage.unwrap_or("none").to_string()),
    ];
    counter!(names::FAILURES_TOTAL, &labels).increment(1);
}

/// Record raw and merged interval counts for one video.
pub fn record_intervals(raw: usize, merged: usize) {
    histogram!(names::MOTION_INTERVALS, "kind" => "raw").record(raw as f64);
    histogram!(names::MOTION_INTERVALS, "kind" => "merged").record(merged as f64);
}

/// Record the duration of a produced clip.
pub fn record_output(duration_secs: f64) {
    histogram!(names::OUTPUT_SECONDS).record(duration_secs);
}

/// Record how long a stage took.
pub fn record_stage(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a delivery attempt.
pub fn record_delivery(sink: &str, success: bool) {
    let labels = [
        ("sink", sink.to_string()),
        ("status", if success { "success" } else { "failure" }.to_string()),
    ];
    counter!(names::DELIVERIES_TOTAL, &labels).increment(1);
}
