//! The burst-to-GIF pipeline.
//!
//! [`BurstPipeline`] drives the whole run: discover raw files, cluster them
//! into burst sequences, and for each admitted sequence copy the originals
//! into the archive tree, downsample them in parallel, and encode the
//! animated artifact. [`PipelineOptions`] threads tuning knobs, the
//! injectable [`CaptureTimeProvider`], progress callbacks, and cancellation
//! through the run without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use burstgif::{BurstError, BurstPipeline, PipelineOptions};
//!
//! let report = BurstPipeline::new("project/RAWs", "project")
//!     .with_options(PipelineOptions::new().with_worker_threads(4))
//!     .run()?;
//!
//! println!(
//!     "rendered {} of {} sequences",
//!     report.sequences_completed, report.sequences_admitted
//! );
//! # Ok::<(), BurstError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::convert::downsample_sequence;
use crate::discover::{RAW_EXTENSIONS, find_image_files, sort_by_modified};
use crate::error::BurstError;
use crate::gif::{GifOptions, encode_gif};
use crate::metadata::{CaptureTimeProvider, ExifToolProvider};
use crate::output::OutputTree;
use crate::progress::{
    CancellationToken, NoOpProgress, OperationType, ProgressCallback, ProgressTracker,
};
use crate::sequence::{Sequence, segment_files};

/// What to do when a single frame fails to decode during downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrorPolicy {
    /// Fail the owning sequence, log it, and continue with the remaining
    /// sequences. The default.
    #[default]
    FailSequence,
    /// Drop the frame with a warning and keep the sequence.
    SkipFrame,
    /// Abort the whole run on the first decode failure.
    AbortRun,
}

/// Configuration for a pipeline run.
///
/// Defaults: a 1-second gap threshold, 20/10 admission bounds, 512 px
/// previews, and 0.1 s per GIF frame.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Maximum capture-time gap between consecutive frames of one burst.
    pub(crate) gap_threshold: Duration,
    /// Minimum length for a sequence closed mid-stream.
    pub(crate) min_length: usize,
    /// Relaxed minimum for the trailing sequence.
    pub(crate) min_trailing_length: usize,
    /// Longer edge of the downsampled display images.
    pub(crate) max_dimension: u32,
    /// GIF encoding settings.
    pub(crate) gif: GifOptions,
    /// Rayon pool size for downsampling. `None` uses the global pool
    /// (bounded by the CPU count).
    pub(crate) worker_threads: Option<usize>,
    /// Extensions (lowercase) accepted during discovery.
    pub(crate) extensions: Vec<String>,
    /// Frame decode failure policy.
    pub(crate) on_decode_error: DecodeErrorPolicy,
    /// Capture timestamp source.
    pub(crate) provider: Arc<dyn CaptureTimeProvider>,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N items).
    pub(crate) batch_size: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            gap_threshold: Duration::from_secs(1),
            min_length: 20,
            min_trailing_length: 10,
            max_dimension: 512,
            gif: GifOptions::default(),
            worker_threads: None,
            extensions: RAW_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            on_decode_error: DecodeErrorPolicy::default(),
            provider: Arc::new(ExifToolProvider::new()),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }
}

impl Debug for PipelineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PipelineOptions")
            .field("gap_threshold", &self.gap_threshold)
            .field("min_length", &self.min_length)
            .field("min_trailing_length", &self.min_trailing_length)
            .field("max_dimension", &self.max_dimension)
            .field("gif", &self.gif)
            .field("worker_threads", &self.worker_threads)
            .field("extensions", &self.extensions)
            .field("on_decode_error", &self.on_decode_error)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl PipelineOptions {
    /// Create options with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum capture-time gap that keeps two frames in the same
    /// sequence. The comparison is inclusive: a gap of exactly the
    /// threshold continues the sequence.
    pub fn with_gap_threshold(mut self, threshold: Duration) -> Self {
        self.gap_threshold = threshold;
        self
    }

    /// Set the minimum length for sequences closed mid-stream.
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Set the relaxed minimum length for the trailing sequence.
    pub fn with_min_trailing_length(mut self, min_trailing_length: usize) -> Self {
        self.min_trailing_length = min_trailing_length;
        self
    }

    /// Set the longer-edge bound for display images.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Set the per-frame delay in hundredths of a second.
    pub fn with_frame_delay(mut self, delay: u16) -> Self {
        self.gif.frame_delay = delay;
        self
    }

    /// Replace the GIF encoding settings wholesale.
    pub fn with_gif_options(mut self, gif: GifOptions) -> Self {
        self.gif = gif;
        self
    }

    /// Bound the downsampling worker pool.
    ///
    /// Each in-flight raw decode holds a full-resolution pixel buffer, so
    /// on memory-constrained machines a small explicit bound beats the
    /// CPU-count default.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads.max(1));
        self
    }

    /// Replace the recognized extension set (matched case-insensitively).
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Set the frame decode failure policy.
    pub fn with_decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.on_decode_error = policy;
        self
    }

    /// Inject a capture timestamp source (tests use a scripted one).
    pub fn with_provider(mut self, provider: Arc<dyn CaptureTimeProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fire the progress callback every `batch_size` items instead of
    /// every item.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Aggregate outcome of one pipeline run.
///
/// A run surfaces exactly one terminal error *or* one of these reports,
/// never a stream of partial errors — front ends only need success/failure
/// plus a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Candidate files discovered under the input root.
    pub files_scanned: usize,
    /// Sequences that met the admission policy.
    pub sequences_admitted: usize,
    /// Admitted sequences whose artifact was written.
    pub sequences_completed: usize,
    /// Admitted sequences that failed (decode, copy, or encode trouble).
    pub sequences_failed: usize,
    /// Candidate runs discarded for being too short.
    pub sequences_discarded: u32,
}

/// The end-to-end burst reconstruction pipeline.
///
/// Consumes the `RAWs` subtree of a project and writes the `GIFs` output
/// tree under the output root. See the [module docs](self) for an example.
pub struct BurstPipeline {
    input_root: PathBuf,
    output_root: PathBuf,
    options: PipelineOptions,
}

impl BurstPipeline {
    /// Create a pipeline reading raw files under `input_root` and writing
    /// the output tree under `output_root`.
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            options: PipelineOptions::default(),
        }
    }

    /// Replace the default options.
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the pipeline to completion.
    ///
    /// Discovery, segmentation, and per-sequence materialization are
    /// strictly sequential; only downsampling fans out. Sequences are
    /// processed one at a time in ascending number order.
    ///
    /// # Errors
    ///
    /// Run-fatal: [`BurstError::MetadataUnavailable`] (clustering is
    /// meaningless without authoritative timestamps),
    /// [`BurstError::Cancelled`], output-tree creation failures, and —
    /// under [`DecodeErrorPolicy::AbortRun`] — the first decode failure.
    /// All other sequence-scoped failures are logged, counted in the
    /// report, and do not stop later sequences.
    pub fn run(&self) -> Result<RunReport, BurstError> {
        let tree = OutputTree::create(&self.output_root)?;

        let mut files = find_image_files(&self.input_root, &self.options.extensions)?;
        sort_by_modified(&mut files);
        log::info!(
            "Processing {} candidate files from {}",
            files.len(),
            self.input_root.display()
        );

        let segmentation = segment_files(&files, self.options.provider.as_ref(), &self.options)?;
        let mut report = RunReport {
            files_scanned: segmentation.files_seen,
            sequences_admitted: segmentation.sequences.len(),
            sequences_discarded: segmentation.discarded,
            ..RunReport::default()
        };

        for sequence in &segmentation.sequences {
            match self.process_sequence(sequence, &tree) {
                Ok(()) => report.sequences_completed += 1,
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e @ BurstError::DecodeFailed { .. })
                    if self.options.on_decode_error == DecodeErrorPolicy::AbortRun =>
                {
                    return Err(e);
                }
                Err(e) => {
                    log::error!("Sequence {} failed: {e}", sequence.number);
                    report.sequences_failed += 1;
                }
            }
        }

        log::info!(
            "Completed run: {} of {} admitted sequences rendered ({} short runs discarded)",
            report.sequences_completed,
            report.sequences_admitted,
            report.sequences_discarded
        );
        Ok(report)
    }

    /// Materialize, downsample, encode, and clean up one admitted sequence.
    fn process_sequence(&self, sequence: &Sequence, tree: &OutputTree) -> Result<(), BurstError> {
        let folder = OutputTree::sequence_folder_name(sequence.number, sequence.len());
        let raw_dir = tree.raw_gifs.join(&folder);
        let export_dir = tree.gif_exports.join(&folder);
        for dir in [&raw_dir, &export_dir] {
            fs::create_dir_all(dir).map_err(|e| BurstError::DirectoryCreate {
                path: dir.clone(),
                source: e,
            })?;
        }

        let copies = self.materialize(sequence, &raw_dir)?;
        let ordered = self.sort_by_capture_time(copies)?;

        // The encoder must be done reading before any display image goes
        // away. Deletion runs even when encoding failed.
        let result = self.render(sequence, &ordered, tree);
        self.cleanup_display_images(&ordered);
        result
    }

    /// Copy the sequence's originals into its staging folder, reporting
    /// per-file progress.
    fn materialize(&self, sequence: &Sequence, raw_dir: &Path) -> Result<Vec<PathBuf>, BurstError> {
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::Materialization,
            Some(sequence.len() as u64),
            self.options.batch_size,
        )
        .with_sequence(sequence.number);

        let mut copies = Vec::with_capacity(sequence.len());
        for file in &sequence.files {
            if self.options.is_cancelled() {
                return Err(BurstError::Cancelled);
            }
            let name = file.file_name().ok_or_else(|| BurstError::CopyFailed {
                from: file.clone(),
                to: raw_dir.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "source path has no file name",
                ),
            })?;
            let destination = raw_dir.join(name);
            fs::copy(file, &destination).map_err(|e| BurstError::CopyFailed {
                from: file.clone(),
                to: destination.clone(),
                source: e,
            })?;
            tracker.record(Some(&destination));
            copies.push(destination);
        }
        Ok(copies)
    }

    /// Re-sort the materialized copies by capture timestamp. The copies
    /// usually arrive in capture order already, but the artifact's frame
    /// order must not depend on that holding.
    fn sort_by_capture_time(&self, copies: Vec<PathBuf>) -> Result<Vec<PathBuf>, BurstError> {
        let mut keyed = copies
            .into_iter()
            .map(|path| {
                self.options
                    .provider
                    .capture_time(&path)
                    .map(|time| (time, path))
            })
            .collect::<Result<Vec<_>, _>>()?;
        keyed.sort_by_key(|(time, _)| *time);
        Ok(keyed.into_iter().map(|(_, path)| path).collect())
    }

    /// Downsample the copies in parallel and encode the artifact.
    fn render(
        &self,
        sequence: &Sequence,
        ordered: &[PathBuf],
        tree: &OutputTree,
    ) -> Result<(), BurstError> {
        let mut displays = downsample_sequence(ordered, &self.options, sequence.number)?;

        // Lexical basename order, not temporal: parallel conversion may
        // finish out of order, and this keeps the frame order deterministic
        // either way.
        displays.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if displays.is_empty() {
            log::warn!(
                "Sequence {} has no decodable frames; no artifact written",
                sequence.number
            );
            return Ok(());
        }

        let artifact = tree
            .finished_gifs
            .join(OutputTree::artifact_name(sequence.number));
        log::info!(
            "Creating GIF {} with {} images...",
            sequence.number,
            displays.len()
        );
        let written = encode_gif(&displays, &artifact, &self.options.gif)?;
        log::info!(
            "Sequence {}: wrote {} frames to {}",
            sequence.number,
            written,
            artifact.display()
        );
        Ok(())
    }

    /// Delete every display image the sequence may have produced.
    ///
    /// Works off the candidate set (PNG sibling of every copy) rather than
    /// the produced list, so partial failures still get cleaned up.
    fn cleanup_display_images(&self, ordered: &[PathBuf]) {
        for display in ordered.iter().map(|p| crate::convert::display_path(p)) {
            if display.exists()
                && let Err(e) = fs::remove_file(&display)
            {
                log::warn!("Failed to remove display image {}: {e}", display.display());
            }
        }
    }
}
