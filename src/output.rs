//! Output tree layout.
//!
//! Every run writes into a fixed tree under the caller-supplied root:
//!
//! ```text
//! GIFs/
//!   RAW_GIFs/GIF<N> | <count> images/    copied originals
//!   GIF_EXPORTS/GIF<N> | <count> images/ reserved for full-size exports
//!   FINISHED_GIFs/GIF<N>.gif             final artifacts
//!   UNSTABILIZED_GIF_EXPORTS/            reserved
//! ```
//!
//! `GIF_EXPORTS` and `UNSTABILIZED_GIF_EXPORTS` are created but never
//! populated by the pipeline; downstream tooling (stabilization, full-size
//! export) expects them to exist. Creation is idempotent — re-running into
//! the same root is fine.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BurstError;

/// The four staging areas of one run, rooted at `<output>/GIFs`.
#[derive(Debug, Clone)]
pub struct OutputTree {
    /// Per-sequence folders of copied originals.
    pub raw_gifs: PathBuf,
    /// Reserved for full-size exports.
    pub gif_exports: PathBuf,
    /// Final animated artifacts.
    pub finished_gifs: PathBuf,
    /// Reserved for unstabilized exports.
    pub unstabilized_exports: PathBuf,
}

impl OutputTree {
    /// Create (idempotently) the output tree under `root`.
    ///
    /// # Errors
    ///
    /// [`BurstError::DirectoryCreate`] — fatal for the run; nothing can be
    /// staged without the tree.
    pub fn create(root: &Path) -> Result<Self, BurstError> {
        let main = root.join("GIFs");
        let tree = Self {
            raw_gifs: main.join("RAW_GIFs"),
            gif_exports: main.join("GIF_EXPORTS"),
            finished_gifs: main.join("FINISHED_GIFs"),
            unstabilized_exports: main.join("UNSTABILIZED_GIF_EXPORTS"),
        };
        for dir in [
            &tree.raw_gifs,
            &tree.gif_exports,
            &tree.finished_gifs,
            &tree.unstabilized_exports,
        ] {
            fs::create_dir_all(dir).map_err(|e| BurstError::DirectoryCreate {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(tree)
    }

    /// Folder name for one sequence's staging areas.
    pub fn sequence_folder_name(number: u32, image_count: usize) -> String {
        format!("GIF{number} | {image_count} images")
    }

    /// File name of one sequence's final artifact.
    pub fn artifact_name(number: u32) -> String {
        format!("GIF{number}.gif")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_all_four_areas() {
        let dir = tempfile::tempdir().unwrap();
        let tree = OutputTree::create(dir.path()).unwrap();

        assert!(tree.raw_gifs.is_dir());
        assert!(tree.gif_exports.is_dir());
        assert!(tree.finished_gifs.is_dir());
        assert!(tree.unstabilized_exports.is_dir());
        assert!(tree.raw_gifs.starts_with(dir.path().join("GIFs")));
    }

    #[test]
    fn creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        OutputTree::create(dir.path()).unwrap();
        OutputTree::create(dir.path()).unwrap();
    }

    #[test]
    fn naming_matches_layout() {
        assert_eq!(OutputTree::sequence_folder_name(3, 25), "GIF3 | 25 images");
        assert_eq!(OutputTree::artifact_name(3), "GIF3.gif");
    }
}
