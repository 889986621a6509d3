//! Curation error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use curator_media::MediaError;

pub type CurationResult<T> = Result<T, CurationError>;

/// Pipeline stage an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    Normalize,
    Segment,
    Assemble,
    Deliver,
}

impl Stage {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Probe => "probe",
            Stage::Normalize => "normalize",
            Stage::Segment => "segment",
            Stage::Assemble => "assemble",
            Stage::Deliver => "deliver",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CurationError {
    #[error("Invalid input {}: {source}", .path.display())]
    InvalidInput {
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("{stage} failed for {}: {source}", .path.display())]
    Processing {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("Delivery failed for {key}: {message}")]
    Delivery { key: String, message: String },

    #[error("Curation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CurationError {
    /// Classify a media error raised while working on `path`.
    ///
    /// Cancellation and configuration errors map to their own variants;
    /// errors describing the file become `InvalidInput`.
    pub fn from_media(stage: Stage, path: impl Into<PathBuf>, source: MediaError) -> Self {
        match source {
            MediaError::Cancelled => Self::Cancelled,
            MediaError::InvalidConfig(message) => Self::Config(message),
            source if source.is_input_error() => Self::InvalidInput {
                path: path.into(),
                source,
            },
            source => Self::Processing {
                stage,
                path: path.into(),
                source,
            },
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn delivery(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Delivery {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CurationError::Processing { stage, .. } => Some(*stage),
            CurationError::Delivery { .. } => Some(Stage::Deliver),
            _ => None,
        }
    }

    /// Check if error is retryable.
    ///
    /// Processing and delivery failures may be transient; input and
    /// configuration errors will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CurationError::Processing { .. } | CurationError::Delivery { .. } | CurationError::Io(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CurationError::InvalidInput { .. } => "invalid_input",
            CurationError::Processing { .. } => "processing",
            CurationError::Delivery { .. } => "delivery",
            CurationError::Cancelled => "cancelled",
            CurationError::Config(_) => "config",
            CurationError::Io(_) => "io",
        }
    }
}
