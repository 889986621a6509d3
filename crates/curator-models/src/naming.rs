//! Unique storage keys for delivered clips.

use std::path::Path;

use uuid::Uuid;

/// Default key prefix for curated videos.
pub const DEFAULT_CLIP_PREFIX: &str = "videos";

/// Build a collision-free key `<prefix>/<uuid><ext>` for a clip.
///
/// The extension is taken from `file_name` (including the dot); names
/// without one produce a bare UUID.
pub fn unique_clip_key(prefix: &str, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let prefix = prefix.trim_end_matches('/');

    if prefix.is_empty() {
        format!("{}{}", Uuid::new_v4(), ext)
    } else {
        format!("{}/{}{}", prefix, Uuid::new_v4(), ext)
    }
}
