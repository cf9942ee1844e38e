//! Binary morphology over a 3×3 neighborhood
//!
//! Opening strips thin protrusions and single-pixel noise; closing fills
//! small interior holes. Neighborhood reads are clamped to the image, so
//! pixels on the border only see their in-bounds neighbors.
//!
//! Thin features such as stray hair strands can be eroded away by the
//! opening. That is a known limitation of the heuristic.

use crate::pipeline::mask::{BinaryMask, BACKGROUND, FOREGROUND};

#[derive(Clone, Copy)]
enum Operation {
    Erode,
    Dilate,
}

fn apply(mask: &BinaryMask, op: Operation) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let mut output = BinaryMask::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    for y in 0..height {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(height - 1);
        for x in 0..width {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(width - 1);

            let mut all_set = true;
            let mut any_set = false;
            for ny in y0..=y1 {
                let row = ny as usize * width as usize;
                for nx in x0..=x1 {
                    let set = mask.data[row + nx as usize] != BACKGROUND;
                    all_set &= set;
                    any_set |= set;
                }
            }

            let keep = match op {
                Operation::Erode => all_set,
                Operation::Dilate => any_set,
            };
            if keep {
                output.set(x, y, FOREGROUND);
            }
        }
    }

    output
}

/// A pixel survives only if its whole in-bounds 3×3 neighborhood is foreground
#[must_use]
pub fn erode(mask: &BinaryMask) -> BinaryMask {
    apply(mask, Operation::Erode)
}

/// A pixel becomes foreground if any pixel of its in-bounds 3×3 neighborhood is
#[must_use]
pub fn dilate(mask: &BinaryMask) -> BinaryMask {
    apply(mask, Operation::Dilate)
}

/// `iterations` erosions followed by as many dilations
#[must_use]
pub fn open(mask: &BinaryMask, iterations: u32) -> BinaryMask {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = erode(&current);
    }
    for _ in 0..iterations {
        current = dilate(&current);
    }
    current
}

/// `iterations` dilations followed by as many erosions
#[must_use]
pub fn close(mask: &BinaryMask, iterations: u32) -> BinaryMask {
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = dilate(&current);
    }
    for _ in 0..iterations {
        current = erode(&current);
    }
    current
}

/// Binarize at `threshold`, then open and close with `iterations` each
#[must_use]
pub fn refine_mask(mask: &BinaryMask, threshold: u8, iterations: u32) -> BinaryMask {
    let binary = mask.binarized(threshold);
    if iterations == 0 {
        return binary;
    }
    close(&open(&binary, iterations), iterations)
}
