//! Alpha feathering by repeated separable box blur
//!
//! Three box passes approximate a Gaussian closely enough for soft mask edges
//! and cost O(width·height) each thanks to a sliding-window running sum.

use crate::config::FeatherConfig;
use crate::error::{BgRemovalError, Result};
use crate::pipeline::classifier::PARALLEL_PIXEL_THRESHOLD;
use crate::pipeline::mask::BinaryMask;
use image::RgbaImage;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayViewMut1, Axis};

/// Base blur radius: `max(1, round(min(w, h) / divisor))`, or the override
#[must_use]
pub fn blur_radius(width: u32, height: u32, config: &FeatherConfig) -> u32 {
    if let Some(radius) = config.radius {
        return radius.max(1);
    }
    let short_side = width.min(height) as f32;
    ((short_side / config.radius_divisor).round() as u32).max(1)
}

/// Radius used by each pass: `r` for all but the last, `ceil(r / 2)` for the
/// last when there is more than one pass
#[must_use]
pub fn pass_radii(radius: u32, passes: u32) -> Vec<u32> {
    let radius = radius.max(1);
    (0..passes)
        .map(|pass| {
            if passes > 1 && pass == passes - 1 {
                (radius / 2 + radius % 2).max(1)
            } else {
                radius
            }
        })
        .collect()
}

/// Mask values reinterpreted as floating-point alpha, shaped `(height, width)`
#[must_use]
pub fn mask_to_alpha(mask: &BinaryMask) -> Array2<f32> {
    let (width, height) = mask.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        f32::from(mask.get(x as u32, y as u32))
    })
}

/// Box-average one lane in place over the clipped window `[i - r, i + r]`
fn blur_lane(mut lane: ArrayViewMut1<f32>, radius: usize) {
    let len = lane.len();
    if len < 2 {
        return;
    }
    let source = lane.to_vec();

    let mut sum: f64 = source[..=radius.min(len - 1)].iter().map(|&v| f64::from(v)).sum();
    for (i, out) in lane.iter_mut().enumerate() {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(len - 1);
        // Subtracting after adding can leave the sum a hair below zero
        *out = ((sum / (hi - lo + 1) as f64) as f32).clamp(0.0, 255.0);

        if i + radius + 1 < len {
            sum += f64::from(source[i + radius + 1]);
        }
        if i >= radius {
            sum -= f64::from(source[i - radius]);
        }
    }
}

/// One horizontal then one vertical box pass
///
/// Each lane is summed in order by a single worker, so parallel and
/// sequential runs produce identical values.
fn separable_pass(alpha: &mut Array2<f32>, radius: u32, parallel: bool) {
    let radius = radius as usize;
    if parallel && alpha.len() >= PARALLEL_PIXEL_THRESHOLD {
        alpha
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|row| blur_lane(row, radius));
        alpha
            .axis_iter_mut(Axis(1))
            .into_par_iter()
            .for_each(|column| blur_lane(column, radius));
    } else {
        for row in alpha.axis_iter_mut(Axis(0)) {
            blur_lane(row, radius);
        }
        for column in alpha.axis_iter_mut(Axis(1)) {
            blur_lane(column, radius);
        }
    }
}

/// Smooth a binary mask into a continuous alpha array in `[0, 255]`
#[must_use]
pub fn feather_mask(mask: &BinaryMask, config: &FeatherConfig, parallel: bool) -> Array2<f32> {
    let mut alpha = mask_to_alpha(mask);
    if alpha.is_empty() {
        return alpha;
    }

    let radius = blur_radius(mask.width, mask.height, config);
    for pass_radius in pass_radii(radius, config.passes) {
        separable_pass(&mut alpha, pass_radius, parallel);
    }
    alpha
}

/// Clamp and round one alpha value to 8 bits
#[inline]
#[must_use]
pub fn quantize(value: f32) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

/// Write quantized alpha into the image's alpha channel
///
/// # Errors
/// - `alpha` shape differs from the image dimensions
pub fn apply_alpha(image: &mut RgbaImage, alpha: &Array2<f32>) -> Result<()> {
    let (width, height) = image.dimensions();
    let (rows, cols) = alpha.dim();
    if rows != height as usize || cols != width as usize {
        return Err(BgRemovalError::dimension_mismatch(
            "alpha buffer",
            (width, height),
            (cols as u32, rows as u32),
        ));
    }

    for (pixel, &value) in image.pixels_mut().zip(alpha.iter()) {
        pixel[3] = quantize(value);
    }
    Ok(())
}

/// Quantized alpha as a row-major mask
#[must_use]
pub fn alpha_to_mask(alpha: &Array2<f32>) -> BinaryMask {
    let (rows, cols) = alpha.dim();
    BinaryMask {
        width: cols as u32,
        height: rows as u32,
        data: alpha.iter().map(|&v| quantize(v)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mask::{BACKGROUND, FOREGROUND};
    use image::Rgba;

    fn centered_block(size: u32, block: u32) -> BinaryMask {
        let mut mask = BinaryMask::new(size, size);
        let start = (size - block) / 2;
        for y in start..start + block {
            for x in start..start + block {
                mask.set(x, y, FOREGROUND);
            }
        }
        mask
    }

    #[test]
    fn test_blur_radius_formula() {
        let config = FeatherConfig::default();
        assert_eq!(blur_radius(4, 4, &config), 1);
        assert_eq!(blur_radius(600, 800, &config), 5);
        assert_eq!(blur_radius(1200, 1600, &config), 10);

        let fixed = FeatherConfig {
            radius: Some(7),
            ..FeatherConfig::default()
        };
        assert_eq!(blur_radius(4, 4, &fixed), 7);
    }

    #[test]
    fn test_blur_radius_scales_with_image() {
        let config = FeatherConfig::default();
        let small = blur_radius(960, 720, &config);
        let large = blur_radius(1920, 1440, &config);
        assert_eq!(small, 6);
        assert_eq!(large, 12);
    }

    #[test]
    fn test_pass_radii_schedule() {
        assert_eq!(pass_radii(5, 3), vec![5, 5, 3]);
        assert_eq!(pass_radii(4, 2), vec![4, 2]);
        assert_eq!(pass_radii(7, 2), vec![7, 4]);
        assert_eq!(pass_radii(u32::MAX, 2), vec![u32::MAX, u32::MAX / 2 + 1]);
        assert_eq!(pass_radii(1, 3), vec![1, 1, 1]);
        assert_eq!(pass_radii(4, 1), vec![4]);
        assert!(pass_radii(4, 0).is_empty());
    }

    #[test]
    fn test_blur_lane_running_sum_matches_direct_average() {
        let values = [0.0_f32, 255.0, 255.0, 0.0, 100.0, 30.0, 0.0];
        let mut lane = ndarray::Array1::from(values.to_vec());
        blur_lane(lane.view_mut(), 2);
        for (i, &got) in lane.iter().enumerate() {
            let lo = i.saturating_sub(2);
            let hi = (i + 2).min(values.len() - 1);
            let expected: f32 = values[lo..=hi].iter().sum::<f32>() / (hi - lo + 1) as f32;
            assert!((got - expected).abs() < 1e-3, "index {i}: {got} vs {expected}");
        }
    }

    #[test]
    fn test_alpha_stays_in_range_and_softens_edges() {
        let mask = centered_block(60, 30);
        let alpha = feather_mask(&mask, &FeatherConfig { radius: Some(3), ..FeatherConfig::default() }, false);
        assert!(alpha.iter().all(|&v| (0.0..=255.0).contains(&v)));
        let edge = alpha[[30, 15]];
        assert!(edge > 0.0 && edge < 255.0, "edge value {edge}");
    }

    #[test]
    fn test_interior_far_from_edges_is_unchanged() {
        let radius = 2_u32;
        let mask = centered_block(80, 40);
        let config = FeatherConfig {
            radius: Some(radius),
            ..FeatherConfig::default()
        };
        let quantized = alpha_to_mask(&feather_mask(&mask, &config, false));
        // Chebyshev distance from each pixel to the nearest pixel of the other class
        let gap = |v: u32| if v < 20 { 20 - v } else if v >= 60 { v - 59 } else { 0 };
        for y in 0..80_u32 {
            for x in 0..80_u32 {
                let inside = (20..60).contains(&x) && (20..60).contains(&y);
                let distance = if inside {
                    (x - 19).min(60 - x).min(y - 19).min(60 - y)
                } else {
                    gap(x).max(gap(y))
                };
                if distance > 3 * radius {
                    assert_eq!(quantized.get(x, y), mask.get(x, y), "({x},{y})");
                }
            }
        }
        assert_eq!(quantized.get(40, 40), FOREGROUND);
        assert_eq!(quantized.get(0, 0), BACKGROUND);
    }

    #[test]
    fn test_zero_passes_keeps_hard_mask() {
        let mask = centered_block(10, 4);
        let config = FeatherConfig {
            passes: 0,
            ..FeatherConfig::default()
        };
        assert_eq!(alpha_to_mask(&feather_mask(&mask, &config, false)), mask);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mask = centered_block(256, 100);
        let config = FeatherConfig::default();
        let seq = feather_mask(&mask, &config, false);
        let par = feather_mask(&mask, &config, true);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_apply_alpha_checks_dimensions() {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 0]));
        let alpha = Array2::from_elem((2, 3), 254.6_f32);
        apply_alpha(&mut img, &alpha).unwrap();
        assert!(img.pixels().all(|p| p[3] == 255));

        let wrong = Array2::from_elem((3, 2), 0.0_f32);
        assert!(apply_alpha(&mut img, &wrong).is_err());
    }
}
