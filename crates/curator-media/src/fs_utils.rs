//! Filesystem utilities for atomic output and cross-device moves.
//!
//! Outputs are always written to a temporary file next to their final
//! location and renamed into place once complete, so a failed or cancelled
//! run never leaves a partial file where a finished one is expected.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Directory an output path lives in (`.` for bare file names).
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Create a uniquely-named temporary file in the same directory as `target`.
///
/// The file is deleted when dropped unless [`persist_over`] is called.
pub fn temp_file_beside(target: &Path, prefix: &str) -> MediaResult<NamedTempFile> {
    let dir = parent_dir(target);
    std::fs::create_dir_all(&dir)?;

    let suffix = target
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(&suffix)
        .tempfile_in(&dir)?;
    Ok(file)
}

/// Atomically replace `target` with a finished temporary file.
pub fn persist_over(temp: NamedTempFile, target: &Path) -> MediaResult<()> {
    temp.persist(target).map_err(|e| MediaError::Io(e.error))?;
    Ok(())
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// This function first attempts a fast rename. If that fails with EXDEV
/// (cross-device link error), it falls back to copy-and-delete.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device rename detected, falling back to copy+delete"
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Copy file to destination (via temp file) then delete source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let temp = temp_file_beside(dst, ".move-")?;
    let temp_path = temp.path().to_path_buf();

    fs::copy(src, &temp_path).await.map_err(|e| {
        tracing::error!(
            src = %src.display(),
            tmp = %temp_path.display(),
            error = %e,
            "Failed to copy file during cross-device move"
        );
        MediaError::from(e)
    })?;

    persist_over(temp, dst)?;

    // Best effort: the destination is complete even if the source lingers.
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            src = %src.display(),
            error = %e,
            "Failed to remove source file after cross-device move"
        );
    }

    Ok(())
}
