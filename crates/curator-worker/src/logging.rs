//! Structured run logging utilities.
//!
//! Provides tracing subscriber setup for the binaries and consistent,
//! structured logging of curation runs with tracing spans.

use std::path::Path;

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Initialize tracing with colored output for dev, JSON for production.
///
/// `RUST_LOG` overrides the default `curator=info` directive; `verbose`
/// lowers the default to debug.
pub fn init_tracing(verbose: bool) {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    // Targets match by prefix, so this covers every curator crate.
    let default_directive = if verbose {
        "curator=debug"
    } else {
        "curator=info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Logs go to stderr; stdout carries JSON reports.
    if use_json {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init();
    }
}

/// Run logger for structured logging with consistent formatting.
///
/// Every event carries the run ID and the source path.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    source: String,
}

impl RunLogger {
    /// Create a logger with a fresh run ID.
    pub fn new(source: &Path) -> Self {
        Self::with_run_id(Uuid::new_v4().to_string(), source)
    }

    /// Create a logger for an existing run ID.
    pub fn with_run_id(run_id: impl Into<String>, source: &Path) -> Self {
        Self {
            run_id: run_id.into(),
            source: source.display().to_string(),
        }
    }

    /// Log the start of a run.
    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            source = %self.source,
            "Curation started: {}", message
        );
    }

    /// Log a stage completion.
    pub fn log_stage(&self, stage: &str, elapsed_secs: f64) {
        info!(
            run_id = %self.run_id,
            source = %self.source,
            stage,
            elapsed_secs,
            "Stage complete"
        );
    }

    /// Log a progress update.
    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            source = %self.source,
            "Curation progress: {}", message
        );
    }

    /// Log a warning.
    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            source = %self.source,
            "Curation warning: {}", message
        );
    }

    /// Log an error.
    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            source = %self.source,
            "Curation error: {}", message
        );
    }

    /// Log the completion of a run.
    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            source = %self.source,
            "Curation completed: {}", message
        );
    }

    /// Get the run ID.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the source path as logged.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "curation",
            run_id = %self.run_id,
            source = %self.source
        )
    }
}
