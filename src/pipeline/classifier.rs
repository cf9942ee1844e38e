//! Per-pixel foreground/background classification
//!
//! The global values the decision needs (background estimate, image center,
//! farthest corner distance) are computed once into a [`PipelineContext`];
//! the per-pixel function only reads it, so rows can be classified
//! independently.

use crate::config::ClassifierConfig;
use crate::pipeline::estimator::BackgroundEstimate;
use crate::pipeline::mask::{BinaryMask, BACKGROUND, FOREGROUND};
use image::RgbaImage;
use rayon::prelude::*;

/// Images at least this large are classified on the rayon pool
pub(crate) const PARALLEL_PIXEL_THRESHOLD: usize = 32 * 1024;

/// Immutable per-run geometry and color context
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineContext {
    pub width: u32,
    pub height: u32,
    pub background: BackgroundEstimate,
    pub center_x: f32,
    pub center_y: f32,
    /// Distance from the image center to a corner
    pub max_distance: f32,
}

impl PipelineContext {
    #[must_use]
    pub fn new(width: u32, height: u32, background: BackgroundEstimate) -> Self {
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        Self {
            width,
            height,
            background,
            center_x,
            center_y,
            max_distance: center_x.hypot(center_y),
        }
    }

    /// Normalized distance of pixel `(x, y)` from the center: 0 at the center,
    /// 1 at the corners. Measured from the pixel's center point.
    #[inline]
    #[must_use]
    pub fn center_ratio(&self, x: u32, y: u32) -> f32 {
        if self.max_distance <= 0.0 {
            return 0.0;
        }
        let dx = x as f32 + 0.5 - self.center_x;
        let dy = y as f32 + 0.5 - self.center_y;
        (dx.hypot(dy) / self.max_distance).min(1.0)
    }
}

/// Channel mean
#[inline]
#[must_use]
pub fn brightness(r: u8, g: u8, b: u8) -> f32 {
    (f32::from(r) + f32::from(g) + f32::from(b)) / 3.0
}

/// `(max - min) / max`, 0 for black
#[inline]
#[must_use]
pub fn saturation(r: u8, g: u8, b: u8) -> f32 {
    let max = r.max(g).max(b);
    if max == 0 {
        return 0.0;
    }
    let min = r.min(g).min(b);
    f32::from(max - min) / f32::from(max)
}

struct PixelClassifier<'a> {
    context: &'a PipelineContext,
    config: &'a ClassifierConfig,
}

impl PixelClassifier<'_> {
    /// Mask value for one pixel
    #[inline]
    fn classify(&self, r: u8, g: u8, b: u8, ratio: f32) -> u8 {
        let cfg = self.config;
        if ratio <= cfg.protect_ratio {
            return FOREGROUND;
        }

        let distance = self.context.background.distance(r, g, b);
        let protection = 1.0 - ratio;
        let threshold =
            cfg.similarity_base + (cfg.similarity_max - cfg.similarity_base) * protection;

        let similar_to_background = distance < threshold;
        let bright_and_flat = brightness(r, g, b) > cfg.bright_threshold
            && saturation(r, g, b) < cfg.saturation_threshold
            && ratio > cfg.bright_ratio;
        let near_corner = ratio > cfg.corner_ratio && distance < cfg.corner_distance;

        if similar_to_background || bright_and_flat || near_corner {
            BACKGROUND
        } else {
            FOREGROUND
        }
    }

    fn classify_row(&self, y: u32, row: &mut [u8], mask_row: &mut [u8]) {
        for (x, (pixel, mask_value)) in row.chunks_exact_mut(4).zip(mask_row.iter_mut()).enumerate()
        {
            let ratio = self.context.center_ratio(x as u32, y);
            let value = self.classify(pixel[0], pixel[1], pixel[2], ratio);
            pixel[3] = value;
            *mask_value = value;
        }
    }
}

/// Classify every pixel as kept (255) or removed (0)
///
/// The pixel buffer's alpha channel is overwritten to mirror the returned mask.
/// Setting `parallel` splits rows across rayon workers for large images; the
/// result is identical either way.
pub fn classify_foreground(
    image: &mut RgbaImage,
    context: &PipelineContext,
    config: &ClassifierConfig,
    parallel: bool,
) -> BinaryMask {
    let (width, height) = image.dimensions();
    let mut mask = BinaryMask::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    let classifier = PixelClassifier { context, config };
    let row_bytes = width as usize * 4;
    let row_len = width as usize;
    let raw: &mut [u8] = &mut **image;

    if parallel && mask.data.len() >= PARALLEL_PIXEL_THRESHOLD {
        raw.par_chunks_exact_mut(row_bytes)
            .zip(mask.data.par_chunks_exact_mut(row_len))
            .enumerate()
            .for_each(|(y, (row, mask_row))| classifier.classify_row(y as u32, row, mask_row));
    } else {
        for (y, (row, mask_row)) in raw
            .chunks_exact_mut(row_bytes)
            .zip(mask.data.chunks_exact_mut(row_len))
            .enumerate()
        {
            classifier.classify_row(y as u32, row, mask_row);
        }
    }

    mask
}
