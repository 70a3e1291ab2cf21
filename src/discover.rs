//! Candidate file discovery.
//!
//! Walks an input tree (typically `<project>/RAWs/Card */`) and collects
//! every file whose extension is in the recognized raw set, then orders the
//! result by file-system modification time. Discovery itself promises no
//! ordering — the mtime sort is a coarse, fast proxy that establishes a
//! stable traversal order before authoritative capture timestamps are
//! consulted during segmentation.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::BurstError;

/// Raw extensions recognized by the pipeline, lowercase.
pub const RAW_EXTENSIONS: &[&str] = &["cr2", "cr3", "nef", "arw", "dng"];

/// Check whether `path` has one of `extensions` (case-insensitive).
pub(crate) fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| extensions.iter().any(|wanted| *wanted == e))
}

/// Recursively find all files under `root` with a recognized extension.
///
/// Symlinks are not followed. No ordering is guaranteed; callers that need
/// a stable order should apply [`sort_by_modified`].
///
/// # Errors
///
/// [`BurstError::InputNotADirectory`] if `root` does not exist or is not a
/// directory. Unreadable entries below the root are skipped with a warning
/// rather than failing the walk.
pub fn find_image_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, BurstError> {
    if !root.is_dir() {
        return Err(BurstError::InputNotADirectory(root.to_path_buf()));
    }

    let files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {e}", root.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| has_extension(path, extensions))
        .collect();

    log::debug!("Discovered {} candidate files under {}", files.len(), root.display());
    Ok(files)
}

/// Sort `files` ascending by file-system modification time.
///
/// The sort is stable, so files with identical mtimes keep their discovery
/// order. A file whose mtime cannot be read sorts first rather than
/// aborting the run; segmentation re-orders by capture time anyway.
pub fn sort_by_modified(files: &mut [PathBuf]) {
    files.sort_by_key(|path| {
        path.metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    });
}
