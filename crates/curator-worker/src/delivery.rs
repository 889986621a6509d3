//! Delivery of curated clips.
//!
//! A [`ClipSink`] receives a verified clip and a unique key. The sink owns
//! the file afterwards; callers must not reuse the path.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use curator_media::move_file;

use crate::error::{CurationError, CurationResult};

/// Where a clip ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredClip {
    /// Storage key the clip was delivered under.
    pub key: String,
    /// Sink-specific location (a filesystem path for [`DirectorySink`]).
    pub location: String,
}

/// Destination for curated clips.
#[async_trait]
pub trait ClipSink: Send + Sync {
    /// Take ownership of `clip` and store it under `key`.
    async fn deliver(&self, clip: &Path, key: &str) -> CurationResult<DeliveredClip>;

    /// Sink name for logs.
    fn name(&self) -> &str;
}

/// Content type for a clip path.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// Check that `key` is a relative path without `..` components.
fn validate_key(key: &str) -> CurationResult<()> {
    let path = Path::new(key);
    let safe = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if safe {
        Ok(())
    } else {
        Err(CurationError::delivery(key, "key must be a relative path without '..'"))
    }
}

/// Delivers clips into a local directory, using the key as relative path.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory clips are delivered into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination path for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ClipSink for DirectorySink {
    async fn deliver(&self, clip: &Path, key: &str) -> CurationResult<DeliveredClip> {
        validate_key(key)?;

        let destination = self.path_for(key);
        debug!(
            clip = %clip.display(),
            destination = %destination.display(),
            content_type = content_type_for(clip),
            "Delivering clip"
        );

        move_file(clip, &destination)
            .await
            .map_err(|e| CurationError::delivery(key, e.to_string()))?;

        info!(key, destination = %destination.display(), "Delivered clip");

        Ok(DeliveredClip {
            key: key.to_string(),
            location: destination.display().to_string(),
        })
    }

    fn name(&self) -> &str {
        "directory"
    }
}
