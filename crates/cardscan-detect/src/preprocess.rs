// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessing — decode, downscale to the working height, and derive an edge
// map with Canny thresholds adapted to the frame's median intensity.

use std::path::Path;

use cardscan_core::{ScanConfig, ScanError};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, info, instrument};

/// Lower/upper hysteresis thresholds for Canny.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannyThresholds {
    pub lower: f32,
    pub upper: f32,
}

impl CannyThresholds {
    /// `lower = clamp(lower_mult * median)`, `upper = clamp(upper_mult * median)`,
    /// both truncated to whole intensities in `[0, 255]`.
    pub fn from_median(median: f32, lower_mult: f32, upper_mult: f32) -> Self {
        Self {
            lower: (lower_mult * median).clamp(0.0, 255.0).trunc(),
            upper: (upper_mult * median).clamp(0.0, 255.0).trunc(),
        }
    }
}

/// Output of the preprocessing stage. Dropped once candidates are extracted.
pub struct Preprocessed {
    /// Downscaled colour frame.
    pub working: RgbImage,
    /// Binary edge map with the working frame's dimensions (values 0 or 255).
    pub edges: GrayImage,
    /// `source_height / working_height`; multiply working coordinates by this.
    pub scale: f32,
    pub thresholds: CannyThresholds,
}

/// Decode raw image bytes (JPEG, PNG, etc.) into an RGB frame.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode_bytes(data: &[u8]) -> Result<RgbImage, ScanError> {
    let image = image::load_from_memory(data)
        .map_err(|err| ScanError::ImageLoad(format!("failed to decode image: {}", err)))?;
    ensure_non_empty(image.to_rgb8())
}

/// Open and decode an image file.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn open_path(path: impl AsRef<Path>) -> Result<RgbImage, ScanError> {
    let image = image::open(path.as_ref()).map_err(|err| {
        ScanError::ImageLoad(format!(
            "failed to open {}: {}",
            path.as_ref().display(),
            err
        ))
    })?;
    ensure_non_empty(image.to_rgb8())
}

fn ensure_non_empty(frame: RgbImage) -> Result<RgbImage, ScanError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ScanError::ImageLoad(format!(
            "image has no pixels ({}x{})",
            frame.width(),
            frame.height()
        )));
    }
    Ok(frame)
}

/// Downscale `raw` to the working height and compute its edge map.
#[instrument(skip_all, fields(width = raw.width(), height = raw.height()))]
pub fn preprocess(raw: &RgbImage, config: &ScanConfig) -> Result<Preprocessed, ScanError> {
    let (width, height) = raw.dimensions();
    if width == 0 || height == 0 {
        return Err(ScanError::ImageLoad("image has no pixels".into()));
    }

    let scale = height as f32 / config.working_height as f32;
    let working_width = ((width as f32 / scale).round() as u32).max(1);
    let working = if height == config.working_height {
        raw.clone()
    } else {
        imageops::resize(raw, working_width, config.working_height, FilterType::Triangle)
    };
    debug!(
        working_width = working.width(),
        working_height = working.height(),
        scale,
        "Working frame ready"
    );

    let gray = imageops::grayscale(&working);
    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    let median = median_intensity(&blurred);
    let thresholds = CannyThresholds::from_median(
        median,
        config.canny_lower_multiplier,
        config.canny_upper_multiplier,
    );
    let edges = canny(&blurred, thresholds.lower, thresholds.upper);

    info!(
        median,
        lower = thresholds.lower,
        upper = thresholds.upper,
        "Edge map computed"
    );

    Ok(Preprocessed {
        working,
        edges,
        scale,
        thresholds,
    })
}

/// Median pixel intensity. For an even pixel count this is the mean of the two
/// middle values.
pub fn median_intensity(gray: &GrayImage) -> f32 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0.0;
    }

    let lower_rank = (total - 1) / 2;
    let upper_rank = total / 2;
    let lower = nth_value(&histogram, lower_rank);
    let upper = nth_value(&histogram, upper_rank);
    (lower as f32 + upper as f32) / 2.0
}

/// Value of the `rank`-th smallest pixel (zero-based) according to `histogram`.
fn nth_value(histogram: &[u64; 256], rank: u64) -> u8 {
    let mut seen = 0u64;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen > rank {
            return value as u8;
        }
    }
    255
}
