//! Single-channel mask shared by the classification and refinement stages

use crate::error::{BgRemovalError, Result};
use crate::types::SegmentationMask;

/// Mask value for a kept (foreground) pixel
pub const FOREGROUND: u8 = 255;
/// Mask value for a removed (background) pixel
pub const BACKGROUND: u8 = 0;

/// Width×height mask on a 0..=255 scale, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl BinaryMask {
    /// All-background mask
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, BACKGROUND)
    }

    /// Mask with every pixel set to `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap existing row-major data
    ///
    /// # Errors
    /// - `data.len()` differs from `width * height`
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(BgRemovalError::invalid_input(format!(
                "Mask data has {} values, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Number of pixels at or above `threshold`
    #[must_use]
    pub fn count_at_least(&self, threshold: u8) -> usize {
        self.data.iter().filter(|&&v| v >= threshold).count()
    }

    /// Number of non-zero pixels
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != BACKGROUND).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == BACKGROUND)
    }

    /// Strict 0/255 copy: values at or above `threshold` become foreground
    #[must_use]
    pub fn binarized(&self, threshold: u8) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .map(|&v| if v >= threshold { FOREGROUND } else { BACKGROUND })
                .collect(),
        }
    }

    /// Whether every non-zero pixel of `self` is also non-zero in `other`
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.dimensions() == other.dimensions()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(&a, &b)| a == BACKGROUND || b != BACKGROUND)
    }

    /// Convert into the public mask type carried by results
    #[must_use]
    pub fn into_segmentation_mask(self) -> SegmentationMask {
        SegmentationMask::new(self.data, (self.width, self.height))
    }
}
