//! Burst sequence segmentation.
//!
//! A burst (stop-motion or time-lapse capture) shows up on disk as a run of
//! files whose capture timestamps are at most one second apart. This module
//! performs the single-pass clustering: it walks a time-ordered file list,
//! fetches each file's capture timestamp through a [`CaptureTimeProvider`],
//! and closes the current run whenever the inter-frame gap exceeds the
//! threshold.
//!
//! Admission is asymmetric on purpose: a run closed mid-stream must have at
//! least [`PipelineOptions::min_length`](crate::PipelineOptions) files
//! (default 20), while the trailing run only needs
//! [`min_trailing_length`](crate::PipelineOptions) (default 10) — a burst
//! cut off by the end of a shoot is more likely to be genuinely short.
//! Sequence numbers are assigned on admission only, so rejected runs never
//! consume a number.

use std::path::PathBuf;

use chrono::{NaiveDateTime, TimeDelta};

use crate::error::BurstError;
use crate::metadata::CaptureTimeProvider;
use crate::pipeline::PipelineOptions;
use crate::progress::{OperationType, ProgressTracker};

/// One admitted burst: an ordered, non-empty list of original files plus
/// the sequence number it was assigned on admission.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// 1-based number, assigned in admission order.
    pub number: u32,
    /// Original file paths in traversal order.
    pub files: Vec<PathBuf>,
}

impl Sequence {
    /// Number of frames in this sequence.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Always `false`: admitted sequences are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The outcome of a segmentation pass.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Admitted sequences in ascending number order.
    pub sequences: Vec<Sequence>,
    /// How many files were examined.
    pub files_seen: usize,
    /// How many candidate runs were discarded for being too short.
    pub discarded: u32,
}

/// Cluster `files` into burst sequences in a single streaming pass.
///
/// `files` must already be in the intended traversal order (ascending
/// file-system mtime — see [`crate::discover::sort_by_modified`]). The
/// authoritative capture timestamp of each file is fetched exactly once,
/// in order.
///
/// Two consecutive files stay in the same run when the capture-time gap is
/// **at most** the threshold — a gap of exactly 1.0 s continues the run,
/// and ties (or out-of-order timestamps) always merge.
///
/// # Errors
///
/// * [`BurstError::MetadataUnavailable`] — a timestamp could not be read;
///   segmentation stops immediately and nothing past that file is admitted.
/// * [`BurstError::Cancelled`] — the cancellation token fired. The token is
///   checked before every metadata fetch, since the external tool call is
///   the one blocking operation here.
pub fn segment_files(
    files: &[PathBuf],
    provider: &dyn CaptureTimeProvider,
    options: &PipelineOptions,
) -> Result<Segmentation, BurstError> {
    let threshold =
        TimeDelta::from_std(options.gap_threshold).unwrap_or(TimeDelta::MAX);

    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::Segmentation,
        Some(files.len() as u64),
        options.batch_size,
    );

    let mut sequences: Vec<Sequence> = Vec::new();
    let mut discarded: u32 = 0;
    let mut current: Vec<PathBuf> = Vec::new();
    let mut previous_time: Option<NaiveDateTime> = None;

    for file in files {
        if options.is_cancelled() {
            return Err(BurstError::Cancelled);
        }

        let current_time = provider.capture_time(file)?;
        tracker.record(Some(file));

        let continues = match previous_time {
            None => true,
            Some(prev) => current_time.signed_duration_since(prev) <= threshold,
        };

        if continues {
            current.push(file.clone());
        } else {
            close_run(&mut current, options.min_length, &mut sequences, &mut discarded);
            current.push(file.clone());
        }
        previous_time = Some(current_time);
    }

    // The trailing run gets the relaxed admission bound.
    close_run(&mut current, options.min_trailing_length, &mut sequences, &mut discarded);

    log::debug!(
        "Segmentation: {} files -> {} sequences admitted, {} runs discarded",
        files.len(),
        sequences.len(),
        discarded
    );

    Ok(Segmentation {
        sequences,
        files_seen: files.len(),
        discarded,
    })
}

/// Close the current run: admit it (assigning the next number) if it meets
/// `min_length`, otherwise bump the discard counter. Leaves `current` empty.
fn close_run(
    current: &mut Vec<PathBuf>,
    min_length: usize,
    sequences: &mut Vec<Sequence>,
    discarded: &mut u32,
) {
    if current.is_empty() {
        return;
    }
    if current.len() >= min_length {
        let number = sequences.len() as u32 + 1;
        sequences.push(Sequence {
            number,
            files: std::mem::take(current),
        });
    } else {
        *discarded += 1;
        current.clear();
    }
}
