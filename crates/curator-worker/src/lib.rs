//! Motion curation worker.
//!
//! This crate provides:
//! - Configuration from defaults, environment and overrides
//! - The curation pipeline (normalize, segment, merge, assemble)
//! - Clip delivery behind the `ClipSink` trait
//! - Structured run logging and metrics

pub mod config;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::CuratorConfig;
pub use delivery::{ClipSink, DeliveredClip, DirectorySink};
pub use error::{CurationError, CurationResult, Stage};
pub use logging::{init_tracing, RunLogger};
pub use pipeline::{CurationPipeline, CurationReport, MotionReport};
