//! Error types for the `burstgif` crate.
//!
//! This module defines [`BurstError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry rich context to aid
//! debugging, including file paths and upstream error messages.

use std::{io::Error as IoError, path::PathBuf};

use image::ImageError;
use thiserror::Error;

/// The unified error type for all `burstgif` operations.
///
/// Every public method that can fail returns `Result<T, BurstError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BurstError {
    /// The capture timestamp for a file could not be obtained.
    ///
    /// Raised when the external metadata tool exits non-zero, cannot be
    /// spawned, or emits output that does not parse as `YYYY:MM:DD HH:MM:SS`.
    /// This error is never swallowed: the pipeline cannot cluster files
    /// without an authoritative timestamp for every one of them, so it
    /// aborts the whole run.
    #[error("Capture time unavailable for {path}: {reason}")]
    MetadataUnavailable {
        /// The file whose metadata could not be read.
        path: PathBuf,
        /// Underlying reason (tool stderr, parse failure, spawn error).
        reason: String,
    },

    /// A raw file could not be decoded into a pixel buffer.
    #[error("Failed to decode {path}: {reason}")]
    DecodeFailed {
        /// The file that failed to decode.
        path: PathBuf,
        /// Underlying decoder message.
        reason: String,
    },

    /// GIF encoding failed (writer creation or frame append).
    #[error("GIF encoding error: {0}")]
    GifEncode(String),

    /// An output directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: IoError,
    },

    /// An original file could not be copied into the staging area.
    #[error("Failed to copy {from} to {to}: {source}")]
    CopyFailed {
        /// Source path of the copy.
        from: PathBuf,
        /// Destination path of the copy.
        to: PathBuf,
        /// The underlying I/O error.
        source: IoError,
    },

    /// The input root does not exist or is not a directory.
    #[error("Input path is not a directory: {0}")]
    InputNotADirectory(PathBuf),

    /// The rayon worker pool for parallel downsampling could not be built.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during decode, resize, or save.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl BurstError {
    /// Whether this error must abort the whole run rather than fail a
    /// single sequence.
    ///
    /// Missing metadata and cancellation are run-fatal; everything else is
    /// scoped to the sequence being processed when it occurred.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            BurstError::MetadataUnavailable { .. } | BurstError::Cancelled
        )
    }
}
