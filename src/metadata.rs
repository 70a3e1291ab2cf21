//! Capture timestamp extraction.
//!
//! Burst clustering needs an authoritative capture time for every file, and
//! file-system timestamps are not it — they reflect the copy, not the
//! shutter. This module defines the [`CaptureTimeProvider`] capability trait
//! and [`ExifToolProvider`], the production implementation that shells out
//! to `exiftool` and parses its `DateTimeOriginal` output.
//!
//! The trait exists so tests (and embedders with their own EXIF stack) can
//! supply deterministic timestamps without spawning any external process.
//!
//! # Example
//!
//! ```no_run
//! use burstgif::{BurstError, CaptureTimeProvider, ExifToolProvider};
//!
//! let provider = ExifToolProvider::new();
//! let taken = provider.capture_time("photos/IMG_0001.CR3".as_ref())?;
//! println!("shot at {taken}");
//! # Ok::<(), BurstError>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use chrono::NaiveDateTime;

use crate::error::BurstError;

/// The date-time layout emitted by `exiftool` for EXIF fields.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Capability trait for reading a file's capture timestamp.
///
/// Implementations must be [`Send`] and [`Sync`]: the pipeline re-sorts
/// materialized copies by capture time and may be driven from worker
/// threads.
pub trait CaptureTimeProvider: Send + Sync {
    /// Return the authoritative capture timestamp for `path`.
    ///
    /// # Errors
    ///
    /// [`BurstError::MetadataUnavailable`] when the timestamp cannot be
    /// read or parsed. Callers must not swallow this: clustering without a
    /// timestamp for every file would silently mis-group bursts.
    fn capture_time(&self, path: &Path) -> Result<NaiveDateTime, BurstError>;
}

/// Reads capture timestamps by invoking `exiftool -DateTimeOriginal`.
///
/// Results are cached per path for the lifetime of the provider, so each
/// file costs at most one external process invocation per run even though
/// the pipeline consults timestamps twice (once while clustering, once when
/// re-sorting the materialized copies).
pub struct ExifToolProvider {
    command: String,
    cache: Mutex<HashMap<PathBuf, NaiveDateTime>>,
}

impl ExifToolProvider {
    /// Create a provider that invokes `exiftool` from `PATH`.
    pub fn new() -> Self {
        Self {
            command: "exiftool".to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Use a custom command name or absolute path for the metadata tool.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    fn unavailable(path: &Path, reason: impl Into<String>) -> BurstError {
        BurstError::MetadataUnavailable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl Default for ExifToolProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureTimeProvider for ExifToolProvider {
    fn capture_time(&self, path: &Path) -> Result<NaiveDateTime, BurstError> {
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(&cached) = cache.get(path) {
                return Ok(cached);
            }
        }

        let output = Command::new(&self.command)
            .arg("-DateTimeOriginal")
            .arg(path)
            .output()
            .map_err(|e| Self::unavailable(path, format!("failed to run {}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::unavailable(
                path,
                format!("{} exited with {}: {}", self.command, output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let timestamp = parse_exiftool_output(&stdout)
            .ok_or_else(|| Self::unavailable(path, format!("unparsable output: {}", stdout.trim())))?;

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(path.to_path_buf(), timestamp);
        Ok(timestamp)
    }
}

/// Parse the single `Label : YYYY:MM:DD HH:MM:SS` line exiftool prints.
///
/// The value itself contains colons, but never `": "`, so splitting on the
/// label separator is unambiguous.
fn parse_exiftool_output(stdout: &str) -> Option<NaiveDateTime> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let (_, value) = line.split_once(": ")?;
    NaiveDateTime::parse_from_str(value.trim(), EXIF_DATETIME_FORMAT).ok()
}
