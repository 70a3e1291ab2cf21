//! Project bootstrap and card import.
//!
//! A "project" is a dated working directory holding the `RAWs` subtree the
//! pipeline consumes. This module creates that directory and copies images
//! off a memory card into `RAWs/Card 1/`, prefixing each file with the
//! project name so frames from different shoots never collide.
//!
//! # Example
//!
//! ```no_run
//! use burstgif::{BurstError, ImportOptions, create_working_directory, import_card_images};
//!
//! let working = create_working_directory(
//!     "/home/me/Pictures".as_ref(),
//!     "2023/04/01",
//!     "claymation",
//! )?;
//! let imported = import_card_images(
//!     "/media/sdcard/DCIM".as_ref(),
//!     &working,
//!     "claymation",
//!     &ImportOptions::new(),
//! )?;
//! println!("imported {imported} images");
//! # Ok::<(), BurstError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::BurstError;
use crate::progress::{
    CancellationToken, NoOpProgress, OperationType, ProgressCallback, ProgressTracker,
};

/// Extensions accepted when importing off a card, lowercase. Wider than
/// the pipeline's raw set: shoots often mix raws with reference JPEGs.
pub const IMPORT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "cr2", "cr3", "nef", "arw"];

/// Configuration for a card import.
#[derive(Clone)]
pub struct ImportOptions {
    progress: Arc<dyn ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }
}

impl ImportOptions {
    /// Create options with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a progress callback (fired once per copied file).
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Create (idempotently) the dated working directory for a project:
/// `<base>/<date> <project_name>`, with slashes in the date turned into
/// dashes so `2023/04/01` nests nowhere.
pub fn create_working_directory(
    base: &Path,
    date: &str,
    project_name: &str,
) -> Result<PathBuf, BurstError> {
    let date_folder = date.replace('/', "-");
    let working = base.join(format!("{date_folder} {project_name}"));
    fs::create_dir_all(&working).map_err(|e| BurstError::DirectoryCreate {
        path: working.clone(),
        source: e,
    })?;
    Ok(working)
}

/// Copy every recognized image from `card_path` (non-recursive — cards are
/// flat) into `<working_directory>/RAWs/Card 1/`, renamed
/// `<project_name> | <original>`. Returns the number of files copied.
///
/// # Errors
///
/// [`BurstError::InputNotADirectory`] if the card path is missing;
/// [`BurstError::CopyFailed`] on the first copy that fails (the import is
/// not transactional — files already copied stay put).
pub fn import_card_images(
    card_path: &Path,
    working_directory: &Path,
    project_name: &str,
    options: &ImportOptions,
) -> Result<u64, BurstError> {
    if !card_path.is_dir() {
        return Err(BurstError::InputNotADirectory(card_path.to_path_buf()));
    }

    let raws_directory = working_directory.join("RAWs").join("Card 1");
    fs::create_dir_all(&raws_directory).map_err(|e| BurstError::DirectoryCreate {
        path: raws_directory.clone(),
        source: e,
    })?;

    let mut sources: Vec<PathBuf> = fs::read_dir(card_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .is_some_and(|e| IMPORT_EXTENSIONS.contains(&e.as_str()))
        })
        .collect();
    sources.sort();

    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::CardImport,
        Some(sources.len() as u64),
        1,
    );

    let mut copied = 0u64;
    for source in &sources {
        if options
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(BurstError::Cancelled);
        }

        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            log::warn!("Skipping card file with unusable name: {}", source.display());
            continue;
        };
        let destination = raws_directory.join(format!("{project_name} | {name}"));
        fs::copy(source, &destination).map_err(|e| BurstError::CopyFailed {
            from: source.clone(),
            to: destination.clone(),
            source: e,
        })?;
        tracker.record(Some(&destination));
        copied += 1;
    }

    log::info!(
        "Imported {copied} images from {} into {}",
        card_path.display(),
        raws_directory.display()
    );
    Ok(copied)
}
