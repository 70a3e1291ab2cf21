//! Animated GIF assembly.
//!
//! This module provides [`GifOptions`] for configuring the animated
//! artifact and [`encode_gif`], which streams an ordered list of display
//! images into a single GIF file. Frames are appended strictly in input
//! order with a uniform delay — no reordering, no deduplication, no color
//! reduction beyond the `gif` crate's palette quantiser.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use burstgif::{BurstError, GifOptions, encode_gif};
//!
//! let frames: Vec<PathBuf> = (1..=3)
//!     .map(|i| PathBuf::from(format!("frames/frame_{i}.png")))
//!     .collect();
//!
//! let options = GifOptions::new().with_frame_delay(10);
//! let written = encode_gif(&frames, "out.gif".as_ref(), &options)?;
//! assert_eq!(written, 3);
//! # Ok::<(), BurstError>(())
//! ```

use std::fs::File;
use std::path::Path;

use gif::{Encoder, Frame, Repeat};
use image::imageops::FilterType;

use crate::error::BurstError;

/// Configuration for animated GIF output.
#[derive(Debug, Clone)]
pub struct GifOptions {
    /// Delay between frames in hundredths of a second
    /// (default: 10 = 100 ms per frame).
    pub frame_delay: u16,
    /// How many times the GIF should repeat. `None` means loop forever.
    pub repeat: Option<u16>,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            frame_delay: 10,
            repeat: None,
        }
    }
}

impl GifOptions {
    /// Create a new [`GifOptions`] with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay between frames in hundredths of a second.
    ///
    /// For example, `10` = 100 ms between frames ≈ 10 fps.
    pub fn with_frame_delay(mut self, delay: u16) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Set the repeat count. `None` means loop forever.
    pub fn with_repeat(mut self, repeat: Option<u16>) -> Self {
        self.repeat = repeat;
        self
    }
}

/// Encode `frames` (paths to display images) into an animated GIF at
/// `output`, in the given order, with a uniform per-frame delay.
///
/// The canvas takes the first frame's dimensions; any later frame that
/// disagrees is resized exactly to the canvas so the artifact stays valid.
/// Frames are read one at a time, so memory use is one decoded frame
/// regardless of sequence length.
///
/// Returns the number of frames written. An empty input writes nothing
/// and returns 0.
pub fn encode_gif(
    frames: &[impl AsRef<Path>],
    output: &Path,
    options: &GifOptions,
) -> Result<u64, BurstError> {
    log::debug!(
        "Encoding {} frames to {} (delay={})",
        frames.len(),
        output.display(),
        options.frame_delay,
    );
    if frames.is_empty() {
        return Ok(0);
    }

    let first = image::open(frames[0].as_ref())?;
    let width = first.width().min(u16::MAX as u32) as u16;
    let height = first.height().min(u16::MAX as u32) as u16;

    let file = File::create(output)
        .map_err(|e| BurstError::GifEncode(format!("failed to create {}: {e}", output.display())))?;
    let mut encoder = Encoder::new(file, width, height, &[])
        .map_err(|e| BurstError::GifEncode(format!("failed to create encoder: {e}")))?;

    let repeat = match options.repeat {
        None => Repeat::Infinite,
        Some(n) => Repeat::Finite(n),
    };
    encoder
        .set_repeat(repeat)
        .map_err(|e| BurstError::GifEncode(format!("failed to set repeat: {e}")))?;

    let mut written = 0u64;
    for (index, path) in frames.iter().enumerate() {
        let mut decoded = if index == 0 {
            first.clone()
        } else {
            image::open(path.as_ref())?
        };
        if decoded.width() != u32::from(width) || decoded.height() != u32::from(height) {
            decoded = decoded.resize_exact(u32::from(width), u32::from(height), FilterType::Lanczos3);
        }

        let mut pixels = decoded.to_rgba8().into_raw();
        let mut frame = Frame::from_rgba_speed(width, height, &mut pixels, 10);
        frame.delay = options.frame_delay;

        encoder
            .write_frame(&frame)
            .map_err(|e| BurstError::GifEncode(format!("failed to write frame {index}: {e}")))?;
        written += 1;
    }

    Ok(written)
}
