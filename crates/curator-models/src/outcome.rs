//! Curation results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A verified, encoded clip containing only motion-bearing footage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputClip {
    /// Location of the encoded file
    pub path: PathBuf,
    /// Duration reported by ffprobe, in seconds
    pub duration_secs: f64,
    /// Number of merged intervals concatenated into the clip
    pub interval_count: usize,
    /// Frame rate the clip was encoded at
    pub fps: f64,
}

/// Terminal result of curating one video.
///
/// `NoMotion` is a normal outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CurationOutcome {
    /// A clip was produced.
    Curated(OutputClip),
    /// Nothing above the motion threshold was found.
    NoMotion {
        /// Duration of the analysed (normalized) source, in seconds
        source_duration_secs: f64,
    },
}

impl CurationOutcome {
    /// The produced clip, if any.
    pub fn clip(&self) -> Option<&OutputClip> {
        match self {
            CurationOutcome::Curated(clip) => Some(clip),
            CurationOutcome::NoMotion { .. } => None,
        }
    }

    /// Whether no clip was produced.
    pub fn is_no_motion(&self) -> bool {
        matches!(self, CurationOutcome::NoMotion { .. })
    }

    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CurationOutcome::Curated(_) => "curated",
            CurationOutcome::NoMotion { .. } => "no_motion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let clip = OutputClip {
            path: PathBuf::from("/tmp/out.mp4"),
            duration_secs: 4.0,
            interval_count: 2,
            fps: 30.0,
        };
        let curated = CurationOutcome::Curated(clip.clone());
        assert_eq!(curated.clip(), Some(&clip));
        assert!(!curated.is_no_motion());
        assert_eq!(curated.label(), "curated");

        let none = CurationOutcome::NoMotion {
            source_duration_secs: 10.0,
        };
        assert!(none.clip().is_none());
        assert!(none.is_no_motion());
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let none = CurationOutcome::NoMotion {
            source_duration_secs: 10.0,
        };
        let json = serde_json::to_value(&none).unwrap();
        assert_eq!(json["outcome"], "no_motion");
        assert_eq!(json["source_duration_secs"], 10.0);
    }
}
