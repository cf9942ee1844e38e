//! Core types for background replacement results

use crate::{
    config::{BackgroundColor, OutputFormat},
    error::{BgRemovalError, Result},
    pipeline::estimator::BackgroundEstimate,
    services::ImageIOService,
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, GrayImage, RgbaImage};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of a background replacement operation
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Subject composited over the flat backdrop (fully opaque)
    pub image: DynamicImage,

    /// Source pixels with the feathered alpha channel, for transparent output
    pub cutout: RgbaImage,

    /// Final alpha mask after feathering
    pub mask: SegmentationMask,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,

    /// Original input path (for logging purposes)
    pub input_path: Option<String>,
}

impl RemovalResult {
    /// Create a new removal result
    #[must_use]
    pub fn new(
        image: DynamicImage,
        cutout: RgbaImage,
        mask: SegmentationMask,
        metadata: ProcessingMetadata,
    ) -> Self {
        let original_dimensions = image.dimensions();
        Self {
            image,
            cutout,
            mask,
            original_dimensions,
            metadata,
            input_path: None,
        }
    }

    /// Attach the input path used for log messages
    #[must_use]
    pub fn with_input_path<S: Into<String>>(mut self, input_path: S) -> Self {
        self.input_path = Some(input_path.into());
        self
    }

    /// Save the composite as PNG
    ///
    /// # Errors
    /// - File creation or PNG encoding failure
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(path, OutputFormat::Png, 100)
    }

    /// Save the transparent cutout as PNG
    ///
    /// # Errors
    /// - File creation or PNG encoding failure
    pub fn save_cutout_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let cutout = DynamicImage::ImageRgba8(self.cutout.clone());
        ImageIOService::save_image(&cutout, path, OutputFormat::Png, 100)
    }

    /// Save the composite in the specified format
    ///
    /// # Errors
    /// - File creation or encoding failure
    /// - Format not compiled in (WebP without `webp-support`)
    pub fn save<P: AsRef<Path>>(&self, path: P, format: OutputFormat, quality: u8) -> Result<()> {
        ImageIOService::save_image(&self.image, path, format, quality)
    }

    /// Save the composite and record the encoding time
    ///
    /// # Errors
    /// - File creation or encoding failure
    pub fn save_with_timing<P: AsRef<Path>>(
        &mut self,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let path_str = path.as_ref().display().to_string();
        let encode_start = instant::Instant::now();
        self.save(&path, format, quality)?;
        let encode_ms = encode_start.elapsed().as_millis() as u64;
        self.metadata.timings.image_encode_ms = Some(encode_ms);

        let total_time_s = self.metadata.timings.total_ms as f64 / 1000.0;
        let input_path = self.input_path.as_deref().unwrap_or("input");
        info!(
            "Processed: {} -> {} in {:.2}s (encode {}ms)",
            input_path, path_str, total_time_s, encode_ms
        );
        Ok(())
    }

    /// Get the composite as raw RGBA bytes
    #[must_use]
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.image.to_rgba8().into_raw()
    }

    /// Get the composite as encoded bytes in the specified format
    ///
    /// # Errors
    /// - Encoding failure
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        ImageIOService::encode_to_bytes(&self.image, format, quality)
    }

    /// Get the transparent cutout as encoded bytes
    ///
    /// # Errors
    /// - Encoding failure
    pub fn cutout_to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let cutout = DynamicImage::ImageRgba8(self.cutout.clone());
        ImageIOService::encode_to_bytes(&cutout, format, quality)
    }

    /// Get image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Get detailed timing breakdown
    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Whether the pipeline found no foreground at all
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.metadata
            .warnings
            .contains(&QualityWarning::NoForeground)
    }

    /// Get timing summary for display
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        let b = t.breakdown_percentages();

        let mut summary = format!(
            "Total: {}ms | Decode: {}ms ({:.1}%) | Classify: {}ms ({:.1}%) | Refine: {}ms ({:.1}%) | Feather: {}ms ({:.1}%) | Composite: {}ms ({:.1}%)",
            t.total_ms,
            t.image_decode_ms, b.decode_pct,
            t.estimate_ms + t.classify_ms, b.classify_pct,
            t.components_ms + t.morphology_ms, b.refine_pct,
            t.feather_ms, b.feather_pct,
            t.composite_ms, b.composite_pct,
        );

        if let Some(encode_ms) = t.image_encode_ms {
            summary.push_str(&format!(" | Encode: {}ms ({:.1}%)", encode_ms, b.encode_pct));
        }

        let other_ms = t.other_overhead_ms();
        if other_ms > 5 || b.other_pct > 1.0 {
            summary.push_str(&format!(" | Other: {}ms ({:.1}%)", other_ms, b.other_pct));
        }

        summary
    }
}

/// Single-channel alpha mask carried by results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            BgRemovalError::internal(format!(
                "Mask has {} values, expected {}x{}",
                self.data.len(),
                width,
                height
            ))
        })
    }

    /// Get mask statistics; pixels above 127 count as foreground
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&x| x > 127).count();
        let partial_pixels = self.data.iter().filter(|&&x| x > 0 && x < 255).count();
        let background_pixels = total_pixels - foreground_pixels;

        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            partial_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }

    /// Save mask as PNG
    ///
    /// # Errors
    /// - Invalid mask data or file/encoding failure
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = DynamicImage::ImageLuma8(self.to_image()?);
        ImageIOService::save_image(&image, path, OutputFormat::Png, 100)
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    /// Pixels with feathered alpha strictly between 0 and 255
    pub partial_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Per-stage timing breakdown in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image loading and decoding
    pub image_decode_ms: u64,

    /// Corner background estimation
    pub estimate_ms: u64,

    /// Per-pixel classification
    pub classify_ms: u64,

    /// Largest component filter
    pub components_ms: u64,

    /// Morphological opening and closing
    pub morphology_ms: u64,

    /// Box-blur feathering
    pub feather_ms: u64,

    /// Backdrop compositing
    pub composite_ms: u64,

    /// Final image encoding (if saving to file)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn measured_ms(&self) -> u64 {
        self.image_decode_ms
            + self.estimate_ms
            + self.classify_ms
            + self.components_ms
            + self.morphology_ms
            + self.feather_ms
            + self.composite_ms
            + self.image_encode_ms.unwrap_or(0)
    }

    /// Get breakdown percentages
    #[must_use]
    pub fn breakdown_percentages(&self) -> TimingBreakdown {
        if self.total_ms == 0 {
            return TimingBreakdown::default();
        }

        let total = self.total_ms as f64;
        let pct = |ms: u64| (ms as f64 / total) * 100.0;

        TimingBreakdown {
            decode_pct: pct(self.image_decode_ms),
            classify_pct: pct(self.estimate_ms + self.classify_ms),
            refine_pct: pct(self.components_ms + self.morphology_ms),
            feather_pct: pct(self.feather_ms),
            composite_pct: pct(self.composite_ms),
            encode_pct: pct(self.image_encode_ms.unwrap_or(0)),
            other_pct: pct(self.other_overhead_ms()),
        }
    }

    /// Get the "other" overhead time (unaccounted time)
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        self.total_ms.saturating_sub(self.measured_ms())
    }
}

/// Percentage breakdown of timing phases
#[derive(Debug, Clone, Default)]
pub struct TimingBreakdown {
    pub decode_pct: f64,
    pub classify_pct: f64,
    pub refine_pct: f64,
    pub feather_pct: f64,
    pub composite_pct: f64,
    pub encode_pct: f64,
    pub other_pct: f64,
}

/// Non-fatal observations about a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityWarning {
    /// Nothing survived classification and refinement; output is all backdrop
    NoForeground,
    /// The detected background is close to the chosen backdrop color
    BackdropMatchesBackground,
}

impl std::fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoForeground => write!(f, "no foreground detected, output is backdrop only"),
            Self::BackdropMatchesBackground => {
                write!(f, "backdrop color is close to the detected background")
            },
        }
    }
}

/// Metadata about the processing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Detailed timing breakdown
    pub timings: ProcessingTimings,

    /// Averaged corner color
    pub background_estimate: Option<BackgroundEstimate>,

    /// Backdrop painted behind the subject
    pub backdrop: BackgroundColor,

    /// Base blur radius used for feathering
    pub blur_radius: u32,

    /// Number of candidate regions seen by the component filter
    pub components_found: usize,

    /// Share of pixels with alpha above 127 in the final mask
    pub foreground_ratio: f32,

    /// Non-fatal quality warnings
    pub warnings: Vec<QualityWarning>,

    /// Input image format
    pub input_format: String,

    /// Output image format
    pub output_format: String,

    /// When processing finished
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    /// Create new processing metadata
    #[must_use]
    pub fn new(backdrop: BackgroundColor) -> Self {
        Self {
            timings: ProcessingTimings::new(),
            background_estimate: None,
            backdrop,
            blur_radius: 0,
            components_found: 0,
            foreground_ratio: 0.0,
            warnings: Vec::new(),
            input_format: "unknown".to_string(),
            output_format: OutputFormat::default().to_string(),
            processed_at: Utc::now(),
        }
    }

    /// Record a warning once
    pub fn add_warning(&mut self, warning: QualityWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmentation_mask_creation() {
        let mask = SegmentationMask::new(vec![255, 128, 0, 255], (2, 2));
        assert_eq!(mask.dimensions, (2, 2));
        assert_eq!(mask.to_image().unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn test_mask_to_image_rejects_bad_length() {
        let mask = SegmentationMask::new(vec![0; 3], (2, 2));
        assert!(mask.to_image().is_err());
    }

    #[test]
    fn test_mask_statistics() {
        let mask = SegmentationMask::new(vec![255, 200, 40, 0], (2, 2));
        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert_eq!(stats.background_pixels, 2);
        assert_eq!(stats.partial_pixels, 2);
        assert_eq!(stats.foreground_ratio, 0.5);
    }

    #[test]
    fn test_empty_mask_statistics_do_not_divide_by_zero() {
        let stats = SegmentationMask::new(Vec::new(), (0, 0)).statistics();
        assert_eq!(stats.foreground_ratio, 0.0);
    }

    #[test]
    fn test_timing_breakdown() {
        let timings = ProcessingTimings {
            image_decode_ms: 10,
            classify_ms: 20,
            feather_ms: 30,
            total_ms: 100,
            ..ProcessingTimings::default()
        };
        let b = timings.breakdown_percentages();
        assert!((b.decode_pct - 10.0).abs() < 1e-9);
        assert!((b.feather_pct - 30.0).abs() < 1e-9);
        assert_eq!(timings.other_overhead_ms(), 40);
    }

    #[test]
    fn test_warnings_are_deduplicated() {
        let mut metadata = ProcessingMetadata::new(BackgroundColor::white());
        metadata.add_warning(QualityWarning::NoForeground);
        metadata.add_warning(QualityWarning::NoForeground);
        assert_eq!(metadata.warnings, vec![QualityWarning::NoForeground]);
    }

    #[test]
    fn test_metadata_serializes_to_json() {
        let metadata = ProcessingMetadata::new(BackgroundColor::black());
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"processed_at\""));
        assert!(json.contains("\"blur_radius\":0"));
    }
}
