//! Raw-to-display downsampling.
//!
//! Each frame of a burst is decoded from its raw sensor file and written as
//! a bounded-resolution PNG next to the original, sized so the longer edge
//! equals the configured maximum (512 px by default) with the shorter edge
//! derived from the same ratio. These display images exist only as encoder
//! input and are deleted after the GIF is written.
//!
//! Decoding a raw file tries the cheap path first: camera raws embed a
//! full-size JPEG preview, which is found by scanning the leading megabytes
//! for JPEG magic markers. When no usable preview exists the sensor data is
//! decoded with `rawloader` and collapsed to a half-resolution RGB image by
//! averaging each 2x2 CFA block — plenty for a 512 px preview. Non-raw
//! extensions go straight through the `image` crate.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, RgbImage, imageops::FilterType};
use rayon::prelude::*;

use crate::discover::RAW_EXTENSIONS;
use crate::error::BurstError;
use crate::pipeline::{DecodeErrorPolicy, PipelineOptions};
use crate::progress::{OperationType, ProgressTracker};

/// How far into a raw file to look for an embedded JPEG preview.
const PREVIEW_SCAN_BYTES: usize = 5 * 1024 * 1024;

/// Ignore embedded JPEGs smaller than this; they are thumbnail-sized.
const PREVIEW_MIN_BYTES: usize = 30_000;

/// Resolve output dimensions so the longer edge equals `max_dimension`.
///
/// The shorter edge is truncated (floor), not rounded, from the same
/// aspect ratio. Square inputs come out square.
pub(crate) fn resize_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width > height {
        let h = (height as u64 * max_dimension as u64 / width as u64) as u32;
        (max_dimension, h.max(1))
    } else {
        let w = (width as u64 * max_dimension as u64 / height as u64) as u32;
        (w.max(1), max_dimension)
    }
}

/// The PNG sibling a downsample of `path` writes to
/// (`IMG_0001.cr3` -> `IMG_0001.png`).
///
/// When the input already is a `.png` (custom extension sets), the display
/// image gets a `.display.png` suffix instead so the original is never
/// overwritten.
pub(crate) fn display_path(path: &Path) -> PathBuf {
    let sibling = path.with_extension("png");
    if sibling == path {
        path.with_extension("display.png")
    } else {
        sibling
    }
}

/// Downsample one file to a PNG sibling (`IMG_0001.cr3` -> `IMG_0001.png`).
///
/// Returns the path of the written PNG.
///
/// # Errors
///
/// [`BurstError::DecodeFailed`] when the file cannot be decoded;
/// [`BurstError::ImageError`] / [`BurstError::IoError`] when the resized
/// result cannot be written.
pub fn downsample_image(path: &Path, max_dimension: u32) -> Result<PathBuf, BurstError> {
    let decoded = decode_image(path)?;
    let (width, height) = resize_dimensions(decoded.width(), decoded.height(), max_dimension);
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);

    let output = display_path(path);
    resized.save(&output)?;
    log::debug!(
        "Downsampled {} -> {} ({}x{})",
        path.display(),
        output.display(),
        width,
        height
    );
    Ok(output)
}

/// Downsample every file of one sequence across a bounded rayon pool.
///
/// Workers are order-agnostic and share no mutable state; the caller
/// re-imposes frame order afterwards by sorting the returned paths. Each
/// concurrent raw decode holds a full sensor-resolution buffer (roughly
/// 2 bytes per pixel, tens of megabytes for modern cameras), which is why
/// the pool size is an explicit option rather than "one thread per file".
///
/// Decode failures are handled per
/// [`PipelineOptions::on_decode_error`](crate::PipelineOptions):
/// `SkipFrame` drops the frame with a warning, the other policies surface
/// the first error to the caller.
pub fn downsample_sequence(
    files: &[PathBuf],
    options: &PipelineOptions,
    sequence_number: u32,
) -> Result<Vec<PathBuf>, BurstError> {
    let tracker = Mutex::new(
        ProgressTracker::new(
            options.progress.clone(),
            OperationType::Downsampling,
            Some(files.len() as u64),
            options.batch_size,
        )
        .with_sequence(sequence_number),
    );

    let work = || -> Vec<(usize, Result<PathBuf, BurstError>)> {
        files
            .par_iter()
            .enumerate()
            .map(|(index, file)| {
                if options.is_cancelled() {
                    return (index, Err(BurstError::Cancelled));
                }
                let result = downsample_image(file, options.max_dimension);
                if let Ok(mut tracker) = tracker.lock() {
                    tracker.record(Some(file));
                }
                (index, result)
            })
            .collect()
    };

    let mut results = match options.worker_threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| BurstError::WorkerPool(e.to_string()))?;
            pool.install(work)
        }
        None => work(),
    };
    results.sort_by_key(|(index, _)| *index);

    let mut outputs = Vec::with_capacity(results.len());
    for (_, result) in results {
        match result {
            Ok(path) => outputs.push(path),
            Err(BurstError::Cancelled) => return Err(BurstError::Cancelled),
            Err(e) if options.on_decode_error == DecodeErrorPolicy::SkipFrame => {
                log::warn!("Skipping frame in sequence {sequence_number}: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outputs)
}

/// Decode any supported input into a pixel buffer.
fn decode_image(path: &Path) -> Result<DynamicImage, BurstError> {
    let is_raw = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| RAW_EXTENSIONS.contains(&e.as_str()));

    if is_raw {
        decode_raw(path)
    } else {
        image::open(path).map_err(|e| BurstError::DecodeFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Decode a raw sensor file: embedded JPEG preview first, sensor data as
/// the fallback.
fn decode_raw(path: &Path) -> Result<DynamicImage, BurstError> {
    if let Some(preview) = extract_embedded_preview(path) {
        return Ok(preview);
    }
    decode_sensor(path)
}

/// Scan the leading bytes of a raw file for an embedded JPEG preview and
/// decode the largest one found.
fn extract_embedded_preview(path: &Path) -> Option<DynamicImage> {
    use std::io::Read;

    let mut file = std::fs::File::open(path).ok()?;
    let mut data = vec![0u8; PREVIEW_SCAN_BYTES];
    let bytes_read = file.read(&mut data).ok()?;
    data.truncate(bytes_read);

    let mut best: Option<DynamicImage> = None;
    for start in jpeg_starts(&data) {
        let Some(end) = jpeg_end(&data, start) else {
            continue;
        };
        if end - start < PREVIEW_MIN_BYTES {
            continue;
        }
        let Ok(decoded) =
            image::load_from_memory_with_format(&data[start..end], image::ImageFormat::Jpeg)
        else {
            continue;
        };
        let pixels = u64::from(decoded.width()) * u64::from(decoded.height());
        let best_pixels = best
            .as_ref()
            .map(|b| u64::from(b.width()) * u64::from(b.height()))
            .unwrap_or(0);
        if pixels > best_pixels {
            best = Some(decoded);
        }
    }
    best
}

/// Offsets of SOI markers (`FF D8 FF`) in `data`, capped at a handful —
/// raws embed at most a few previews.
fn jpeg_starts(data: &[u8]) -> Vec<usize> {
    let mut starts = Vec::new();
    for (i, window) in data.windows(3).enumerate() {
        if window[0] == 0xFF && window[1] == 0xD8 && window[2] == 0xFF {
            starts.push(i);
            if starts.len() >= 5 {
                break;
            }
        }
    }
    starts
}

/// Offset one past the EOI marker (`FF D9`) following `start`, if any.
fn jpeg_end(data: &[u8], start: usize) -> Option<usize> {
    data[start..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])
        .map(|pos| start + pos + 2)
}

/// Decode actual sensor data with `rawloader` and collapse each 2x2 CFA
/// block into one RGB pixel (half resolution, no interpolation artifacts).
fn decode_sensor(path: &Path) -> Result<DynamicImage, BurstError> {
    let decode_failed = |reason: String| BurstError::DecodeFailed {
        path: path.to_path_buf(),
        reason,
    };

    let raw = rawloader::decode_file(path).map_err(|e| decode_failed(format!("{e:?}")))?;
    let data: Vec<u16> = match raw.data {
        rawloader::RawImageData::Integer(values) => values,
        rawloader::RawImageData::Float(values) => values
            .iter()
            .map(|&v| (v * 65535.0).clamp(0.0, 65535.0) as u16)
            .collect(),
    };

    if raw.cpp != 1 {
        return Err(decode_failed(format!(
            "unsupported components-per-pixel: {}",
            raw.cpp
        )));
    }
    if raw.width < 2 || raw.height < 2 || data.len() < raw.width * raw.height {
        return Err(decode_failed("sensor data truncated".to_string()));
    }

    // As-shot white balance, normalized so green is 1.0.
    let wb = {
        let coeffs = raw.wb_coeffs;
        let green = coeffs[1];
        if green.is_finite() && green > 0.0 {
            [coeffs[0] / green, 1.0, coeffs[2] / green]
        } else {
            [1.0, 1.0, 1.0]
        }
    };

    let out_width = (raw.width / 2) as u32;
    let out_height = (raw.height / 2) as u32;
    let mut pixels = RgbImage::new(out_width, out_height);

    for y in 0..out_height as usize {
        for x in 0..out_width as usize {
            let mut sums = [0.0f32; 3];
            let mut counts = [0.0f32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let row = y * 2 + dy;
                    let col = x * 2 + dx;
                    let mut color = raw.cfa.color_at(row, col);
                    if color > 2 {
                        // Emerald / second green sites count as green.
                        color = 1;
                    }
                    let black = raw.blacklevels[color] as f32;
                    let white = raw.whitelevels[color] as f32;
                    let value = data[row * raw.width + col] as f32;
                    let range = (white - black).max(1.0);
                    sums[color] += ((value - black) / range).clamp(0.0, 1.0);
                    counts[color] += 1.0;
                }
            }

            let mut rgb = [0u8; 3];
            for c in 0..3 {
                let mut v = if counts[c] > 0.0 { sums[c] / counts[c] } else { 0.0 };
                v = (v * wb[c]).clamp(0.0, 1.0);
                // sRGB-ish gamma; previews do not need a full color pipeline.
                rgb[c] = (v.powf(1.0 / 2.2) * 255.0).round() as u8;
            }
            pixels.put_pixel(x as u32, y as u32, image::Rgb(rgb));
        }
    }

    Ok(DynamicImage::ImageRgb8(pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn display_path_never_clobbers_the_source() {
        assert_eq!(display_path(Path::new("/x/a.cr3")), PathBuf::from("/x/a.png"));
        assert_eq!(display_path(Path::new("/x/a.CR3")), PathBuf::from("/x/a.png"));
        assert_eq!(
            display_path(Path::new("/x/a.png")),
            PathBuf::from("/x/a.display.png")
        );
    }

    #[test]
    fn landscape_resize_truncates_height() {
        assert_eq!(resize_dimensions(6000, 4000, 512), (512, 341));
        // 30/100 * 512 = 153.6 -> truncated, not rounded.
        assert_eq!(resize_dimensions(100, 30, 512), (512, 153));
    }

    #[test]
    fn portrait_resize_truncates_width() {
        assert_eq!(resize_dimensions(4000, 6000, 512), (341, 512));
        assert_eq!(resize_dimensions(30, 100, 512), (153, 512));
    }

    #[test]
    fn square_resize_stays_square() {
        assert_eq!(resize_dimensions(3000, 3000, 512), (512, 512));
    }

    #[test]
    fn degenerate_dimensions_clamp_to_one() {
        assert_eq!(resize_dimensions(10_000, 1, 512), (512, 1));
    }

    #[test]
    fn downsample_writes_png_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frame.bmp");
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 50, image::Rgb([10, 20, 30])));
        img.save(&input).unwrap();

        let output = downsample_image(&input, 512).unwrap();
        assert_eq!(output, dir.path().join("frame.png"));
        let written = image::open(&output).unwrap();
        assert_eq!((written.width(), written.height()), (512, 256));
    }

    #[test]
    fn downsample_unreadable_raw_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("corrupt.cr3");
        std::fs::write(&input, b"not a raw file at all").unwrap();

        let err = downsample_image(&input, 512).unwrap_err();
        assert!(matches!(err, BurstError::DecodeFailed { .. }));
    }

    #[test]
    fn embedded_preview_is_found_behind_a_prefix() {
        // A JPEG buried after raw-ish header bytes must be located by the
        // marker scan and decoded.
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 200, image::Rgb([200, 90, 10])));
        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.cr3");
        let mut blob = vec![0x49u8, 0x49, 0x2A, 0x00];
        blob.extend(std::iter::repeat_n(0u8, 1024));
        blob.extend_from_slice(&jpeg);
        blob.extend(std::iter::repeat_n(0u8, 256));
        std::fs::write(&path, &blob).unwrap();

        // Tiny JPEGs are below PREVIEW_MIN_BYTES; only assert when the
        // fixture is big enough to qualify as a preview.
        if jpeg.len() >= PREVIEW_MIN_BYTES {
            let preview = extract_embedded_preview(&path).unwrap();
            assert_eq!((preview.width(), preview.height()), (320, 200));
        } else {
            assert!(extract_embedded_preview(&path).is_none());
        }
    }

    #[test]
    fn jpeg_marker_scan_finds_start_and_end() {
        let mut data = vec![0u8; 64];
        data[10] = 0xFF;
        data[11] = 0xD8;
        data[12] = 0xFF;
        data[40] = 0xFF;
        data[41] = 0xD9;

        assert_eq!(jpeg_starts(&data), vec![10]);
        assert_eq!(jpeg_end(&data, 10), Some(42));
        assert_eq!(jpeg_end(&data, 43), None);
    }
}
