//! # burstgif
//!
//! Reconstruct burst sequences from raw camera files and render them as
//! animated GIF previews.
//!
//! Stop-motion and time-lapse shoots leave a card full of raw files with no
//! structure beyond their capture timestamps. `burstgif` ingests such a
//! tree, clusters files shot within a tight time window into "burst
//! sequences", archives each qualifying sequence's originals into a
//! reorganized output tree, and renders an animated GIF preview per
//! sequence.
//!
//! ## Quick Start
//!
//! ```no_run
//! use burstgif::BurstPipeline;
//!
//! let report = BurstPipeline::new("project/RAWs", "project").run().unwrap();
//! println!("{} GIF sequences created", report.sequences_completed);
//! ```
//!
//! ## Tuning the run
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use burstgif::{BurstPipeline, DecodeErrorPolicy, PipelineOptions};
//!
//! let options = PipelineOptions::new()
//!     .with_gap_threshold(Duration::from_secs(1))
//!     .with_min_length(20)
//!     .with_min_trailing_length(10)
//!     .with_max_dimension(512)
//!     .with_worker_threads(4)
//!     .with_decode_error_policy(DecodeErrorPolicy::SkipFrame);
//!
//! let report = BurstPipeline::new("project/RAWs", "project")
//!     .with_options(options)
//!     .run()
//!     .unwrap();
//! # let _ = report;
//! ```
//!
//! ## How a run works
//!
//! 1. **Discover** — recursively collect raw files under the input root
//!    and order them by file-system mtime (a coarse traversal order).
//! 2. **Segment** — read each file's authoritative capture timestamp (via
//!    `exiftool` by default; injectable through [`CaptureTimeProvider`])
//!    and cluster runs whose inter-frame gaps stay within one second.
//!    Mid-stream runs need 20 frames to be admitted, the trailing run
//!    only 10.
//! 3. **Materialize** — copy each admitted sequence's originals into
//!    `GIFs/RAW_GIFs/GIF<N> | <count> images/`.
//! 4. **Downsample** — convert the copies to 512 px PNGs across a bounded
//!    rayon pool.
//! 5. **Encode** — append the PNGs in lexical basename order into
//!    `GIFs/FINISHED_GIFs/GIF<N>.gif` at 0.1 s per frame, then delete the
//!    PNGs.
//!
//! Missing capture metadata aborts the whole run — clustering without an
//! authoritative timestamp for every file would silently mis-group bursts.
//! Everything else fails at sequence scope and is tallied in the
//! [`RunReport`].
//!
//! ## Features
//!
//! - **Burst clustering** — inclusive 1-second gap threshold, asymmetric
//!   20/10 admission policy, admission-only sequence numbering
//! - **Raw decoding** — embedded JPEG preview extraction with a
//!   `rawloader` sensor-decode fallback
//! - **Parallel downsampling** — bounded worker pool, deterministic frame
//!   order regardless of completion order
//! - **Progress & cancellation** — cooperative callbacks and
//!   [`CancellationToken`] around every blocking step, including the
//!   external metadata tool
//! - **Project bootstrap** — dated working directories and card import
//!   (`RAWs/Card 1/` population)

pub mod convert;
pub mod discover;
pub mod error;
pub mod gif;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod project;
pub mod sequence;

pub use convert::{downsample_image, downsample_sequence};
pub use discover::{RAW_EXTENSIONS, find_image_files, sort_by_modified};
pub use error::BurstError;
pub use gif::{GifOptions, encode_gif};
pub use metadata::{CaptureTimeProvider, ExifToolProvider};
pub use output::OutputTree;
pub use pipeline::{BurstPipeline, DecodeErrorPolicy, PipelineOptions, RunReport};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use project::{
    IMPORT_EXTENSIONS, ImportOptions, create_working_directory, import_card_images,
};
pub use sequence::{Segmentation, Sequence, segment_files};
