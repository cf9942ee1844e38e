//! Largest connected component filter
//!
//! Per-pixel classification leaves isolated speckles (buttons, jewelry, stray
//! background-colored patches). Keeping only the largest 4-connected blob of
//! candidate pixels removes them without per-pixel confidence tuning.

use crate::pipeline::mask::{BinaryMask, BACKGROUND};

/// Outcome of the component search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentStats {
    /// Number of 4-connected candidate regions found
    pub components: usize,
    /// Pixel count of the region that was kept (0 when none)
    pub largest_size: usize,
    /// Candidate pixels zeroed because they were outside the kept region
    pub removed_pixels: usize,
}

/// Keep only the largest 4-connected region of pixels `>= candidate_threshold`
///
/// Kept pixels retain their value, every other candidate pixel is zeroed, and
/// pixels below the threshold are left untouched. The first region found in
/// row-major scan order wins ties. A mask without candidates is returned
/// unchanged.
#[must_use]
pub fn keep_largest_component(mask: &BinaryMask, candidate_threshold: u8) -> (BinaryMask, ComponentStats) {
    let width = mask.width as usize;
    let height = mask.height as usize;
    let len = mask.data.len();
    let mut stats = ComponentStats::default();
    if len == 0 {
        return (mask.clone(), stats);
    }

    let is_candidate = |idx: usize| mask.data[idx] >= candidate_threshold;

    let mut visited = vec![false; len];
    let mut stack: Vec<usize> = Vec::with_capacity(width.max(height) * 4);
    let mut best: Option<(usize, usize)> = None;

    for seed in 0..len {
        if visited[seed] || !is_candidate(seed) {
            continue;
        }
        let size = flood_fill(seed, width, height, &is_candidate, &mut visited, &mut stack);
        stats.components += 1;
        if best.map_or(true, |(_, best_size)| size > best_size) {
            best = Some((seed, size));
        }
    }

    let Some((seed, size)) = best else {
        return (mask.clone(), stats);
    };
    stats.largest_size = size;

    let mut keep = vec![false; len];
    flood_fill(seed, width, height, &is_candidate, &mut keep, &mut stack);

    let mut output = mask.clone();
    for (idx, value) in output.data.iter_mut().enumerate() {
        if *value >= candidate_threshold && !keep[idx] {
            *value = BACKGROUND;
            stats.removed_pixels += 1;
        }
    }

    (output, stats)
}

/// Iterative 4-neighbor flood fill marking `marks`; returns the region size.
///
/// Uses an explicit index stack so region size is bounded by memory, not by the
/// call stack.
fn flood_fill<F>(
    seed: usize,
    width: usize,
    height: usize,
    is_candidate: &F,
    marks: &mut [bool],
    stack: &mut Vec<usize>,
) -> usize
where
    F: Fn(usize) -> bool,
{
    stack.clear();
    stack.push(seed);
    marks[seed] = true;
    let mut size = 0;

    while let Some(idx) = stack.pop() {
        size += 1;
        let x = idx % width;
        let y = idx / width;

        let mut visit = |n: usize| {
            if !marks[n] && is_candidate(n) {
                marks[n] = true;
                stack.push(n);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < width {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - width);
        }
        if y + 1 < height {
            visit(idx + width);
        }
    }

    size
}
