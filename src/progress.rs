//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring pipeline
//! progress, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for detailed progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use burstgif::{
//!     BurstError, BurstPipeline, CancellationToken, PipelineOptions,
//!     ProgressCallback, ProgressInfo,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = PipelineOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_cancellation(token.clone());
//!
//! let report = BurstPipeline::new("project/RAWs", "project")
//!     .with_options(options)
//!     .run()?;
//! # Ok::<(), BurstError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of work currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Walking the input tree for candidate raw files.
    Discovery,
    /// Reading capture timestamps and clustering files into sequences.
    Segmentation,
    /// Copying original files into the staging area.
    Materialization,
    /// Converting raw files to display-size PNGs.
    Downsampling,
    /// Appending frames to the animated GIF.
    GifEncoding,
    /// Copying card images into a project's working directory.
    CardImport,
}

/// A snapshot of pipeline progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`PipelineOptions::with_batch_size`](crate::PipelineOptions).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many items (files / frames) have been processed so far.
    pub current: u64,
    /// Total items expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The sequence number currently being processed, if any.
    pub sequence: Option<u32>,
    /// The file currently being processed, if any.
    pub current_file: Option<PathBuf>,
}

/// Trait for receiving progress updates during a pipeline run.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks may be
/// invoked from rayon worker threads during parallel downsampling.
///
/// Progress callbacks are **infallible** — they observe but cannot halt
/// the operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during a pipeline operation.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation of the associated run. The pipeline checks
/// [`is_cancelled`](CancellationToken::is_cancelled) before each unit of
/// work — in particular before every external metadata fetch, which is the
/// primary availability risk (the external tool can hang).
///
/// # Example
///
/// ```
/// use burstgif::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// // From another thread (or a signal handler, etc.):
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
    sequence: Option<u32>,
}

impl ProgressTracker {
    /// Create a new tracker.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
            sequence: None,
        }
    }

    /// Attach a sequence number to subsequent snapshots.
    pub(crate) fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Record one completed item and fire the callback if the batch
    /// threshold has been reached.
    pub(crate) fn record(&mut self, current_file: Option<&Path>) {
        self.current += 1;
        self.items_since_last_report += 1;

        let is_last = self.total.is_some_and(|t| self.current >= t);
        if self.items_since_last_report >= self.batch_size || is_last {
            self.items_since_last_report = 0;
            self.emit(current_file);
        }
    }

    fn emit(&self, current_file: Option<&Path>) {
        let elapsed = self.start_time.elapsed();
        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);
        let estimated_remaining = self.total.and_then(|t| {
            if self.current == 0 || self.current >= t {
                return None;
            }
            let per_item = elapsed.as_secs_f64() / self.current as f64;
            Some(Duration::from_secs_f64(per_item * (t - self.current) as f64))
        });

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            sequence: self.sequence,
            current_file: current_file.map(Path::to_path_buf),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        infos: Mutex<Vec<ProgressInfo>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.infos.lock().unwrap().push(info.clone());
        }
    }

    #[test]
    fn tracker_reports_every_item_with_batch_size_one() {
        let recorder = Arc::new(Recorder {
            infos: Mutex::new(Vec::new()),
        });
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::Segmentation, Some(3), 1);
        for _ in 0..3 {
            tracker.record(None);
        }

        let infos = recorder.infos.lock().unwrap();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[2].current, 3);
        assert_eq!(infos[2].percentage, Some(100.0));
    }

    #[test]
    fn tracker_batches_reports() {
        let recorder = Arc::new(Recorder {
            infos: Mutex::new(Vec::new()),
        });
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::Downsampling, Some(10), 4);
        for _ in 0..10 {
            tracker.record(None);
        }

        // Reports at items 4, 8, and 10 (the final item always reports).
        let infos = recorder.infos.lock().unwrap();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].current, 4);
        assert_eq!(infos[2].current, 10);
    }

    #[test]
    fn tracker_carries_sequence_number() {
        let recorder = Arc::new(Recorder {
            infos: Mutex::new(Vec::new()),
        });
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::Materialization, Some(1), 1)
                .with_sequence(7);
        tracker.record(Some(Path::new("/tmp/a.cr3")));

        let infos = recorder.infos.lock().unwrap();
        assert_eq!(infos[0].sequence, Some(7));
        assert_eq!(infos[0].current_file.as_deref(), Some(Path::new("/tmp/a.cr3")));
    }
}
