//! Heuristic background replacement pipeline
//!
//! Stages run strictly in order, each consuming the previous stage's output:
//!
//! 1. [`estimator`]: average the four corner squares into a background color
//! 2. [`classifier`]: per-pixel keep/remove decision with center protection
//! 3. [`components`]: keep only the largest 4-connected foreground region
//! 4. [`morphology`]: binarize, then 3×3 opening and closing
//! 5. [`feather`]: multi-pass separable box blur of the alpha channel
//! 6. [`compositor`]: blend the subject over a flat backdrop color
//!
//! Every run owns its buffers; nothing is shared between runs.

pub mod classifier;
pub mod components;
pub mod compositor;
pub mod estimator;
pub mod feather;
pub mod mask;
pub mod morphology;

pub use classifier::{classify_foreground, PipelineContext};
pub use components::{keep_largest_component, ComponentStats};
pub use compositor::{composite, composite_with_mask};
pub use estimator::{estimate_background, BackgroundEstimate};
pub use feather::{apply_alpha, blur_radius, feather_mask};
pub use mask::BinaryMask;
pub use morphology::refine_mask;

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    services::{ProcessingStage, ProgressTracker},
    types::{ProcessingTimings, QualityWarning},
};
use image::RgbaImage;
use instant::Instant;
use tracing::{debug, info, instrument, span, warn, Level};

/// Everything a single pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Opaque image with the backdrop behind the subject
    pub composite: RgbaImage,
    /// Source RGB with the feathered alpha channel
    pub cutout: RgbaImage,
    /// Feathered alpha, quantized to 8 bits
    pub alpha: BinaryMask,
    pub estimate: BackgroundEstimate,
    pub blur_radius: u32,
    pub components: ComponentStats,
    /// Stage timings; decode, encode and total are left for the caller
    pub timings: ProcessingTimings,
    pub warnings: Vec<QualityWarning>,
}

/// Runs the six stages with one validated configuration
#[derive(Debug, Clone)]
pub struct BackdropPipeline {
    config: RemovalConfig,
}

impl BackdropPipeline {
    /// Create a pipeline after validating `config`
    ///
    /// # Errors
    /// - Any value rejected by [`RemovalConfig::validate`]
    pub fn new(config: RemovalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Replace the background of `image`
    ///
    /// # Errors
    /// - Zero width or height
    pub fn run(&self, image: RgbaImage) -> Result<PipelineOutput> {
        self.run_with_progress(image, &mut ProgressTracker::no_op())
    }

    /// Replace the background of `image`, reporting each stage to `progress`
    ///
    /// # Errors
    /// - Zero width or height
    #[instrument(
        skip(self, image, progress),
        fields(
            dimensions = %format!("{}x{}", image.width(), image.height()),
            parallel = self.config.parallel
        )
    )]
    pub fn run_with_progress(
        &self,
        mut image: RgbaImage,
        progress: &mut ProgressTracker,
    ) -> Result<PipelineOutput> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(BgRemovalError::empty_image(width, height));
        }

        let cfg = &self.config;
        let mut timings = ProcessingTimings::default();
        let mut warnings = Vec::new();

        progress.report_stage(ProcessingStage::BackgroundEstimation);
        let stage_start = Instant::now();
        let estimate = estimate_background(&image, cfg.classifier.sample_fraction);
        timings.estimate_ms = stage_start.elapsed().as_millis() as u64;
        debug!(
            r = estimate.r,
            g = estimate.g,
            b = estimate.b,
            samples = estimate.samples,
            "Estimated background color"
        );

        let backdrop = cfg.backdrop;
        if estimate.distance(backdrop.r, backdrop.g, backdrop.b) < cfg.classifier.similarity_base {
            debug!(backdrop = %backdrop, "Backdrop is close to the detected background");
            warnings.push(QualityWarning::BackdropMatchesBackground);
        }

        progress.report_stage(ProcessingStage::Classification);
        let mask = {
            let _span = span!(Level::DEBUG, "classify").entered();
            let stage_start = Instant::now();
            let context = PipelineContext::new(width, height, estimate);
            let mask = classify_foreground(&mut image, &context, &cfg.classifier, cfg.parallel);
            timings.classify_ms = stage_start.elapsed().as_millis() as u64;
            mask
        };
        self.log_mask("classification", &mask);

        progress.report_stage(ProcessingStage::ComponentFiltering);
        let (mask, components) = {
            let _span = span!(Level::DEBUG, "components").entered();
            let stage_start = Instant::now();
            let result = keep_largest_component(&mask, cfg.refinement.candidate_threshold);
            timings.components_ms = stage_start.elapsed().as_millis() as u64;
            result
        };
        debug!(
            components = components.components,
            largest = components.largest_size,
            removed = components.removed_pixels,
            "Filtered connected components"
        );

        progress.report_stage(ProcessingStage::MaskRefinement);
        let mask = {
            let _span = span!(Level::DEBUG, "morphology").entered();
            let stage_start = Instant::now();
            let refined = refine_mask(
                &mask,
                cfg.refinement.binarize_threshold,
                cfg.refinement.morph_iterations,
            );
            timings.morphology_ms = stage_start.elapsed().as_millis() as u64;
            refined
        };
        self.log_mask("morphology", &mask);

        if mask.is_empty() {
            warn!(
                dimensions = %format!("{}x{}", width, height),
                "No foreground survived refinement; output is backdrop only"
            );
            warnings.push(QualityWarning::NoForeground);
        }

        let radius = blur_radius(width, height, &cfg.feather);
        progress.report_stage_with_description(
            ProcessingStage::Feathering,
            format!(
                "Feathering edges (radius {}, {} passes)",
                radius, cfg.feather.passes
            ),
        );
        let alpha = {
            let _span = span!(Level::DEBUG, "feather", radius).entered();
            let stage_start = Instant::now();
            let alpha = feather_mask(&mask, &cfg.feather, cfg.parallel);
            apply_alpha(&mut image, &alpha)?;
            timings.feather_ms = stage_start.elapsed().as_millis() as u64;
            feather::alpha_to_mask(&alpha)
        };

        progress.report_stage(ProcessingStage::Compositing);
        let stage_start = Instant::now();
        let composite = composite(&image, backdrop);
        timings.composite_ms = stage_start.elapsed().as_millis() as u64;

        info!(
            foreground = alpha.count_at_least(128),
            total = alpha.data.len(),
            blur_radius = radius,
            "Background replaced"
        );

        Ok(PipelineOutput {
            composite,
            cutout: image,
            alpha,
            estimate,
            blur_radius: radius,
            components,
            timings,
            warnings,
        })
    }

    fn log_mask(&self, stage: &str, mask: &BinaryMask) {
        let kept = mask.foreground_count();
        if self.config.debug {
            info!(stage, kept, total = mask.data.len(), "Mask after stage");
        } else {
            debug!(stage, kept, total = mask.data.len(), "Mask after stage");
        }
    }
}

/// Run the pipeline once with `config`
///
/// # Errors
/// - Invalid configuration
/// - Zero width or height
pub fn run_pipeline(image: RgbaImage, config: &RemovalConfig) -> Result<PipelineOutput> {
    BackdropPipeline::new(config.clone())?.run(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackgroundColor, FeatherConfig};
    use crate::services::{ProgressReporter, ProgressUpdate};
    use image::Rgba;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_zero_sized_image_is_rejected() {
        let err = run_pipeline(RgbaImage::new(0, 5), &RemovalConfig::default()).unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidInput(_)));
    }

    #[test]
    fn test_uniform_image_keeps_only_center_region() {
        let img = RgbaImage::from_pixel(30, 30, Rgba([90, 140, 60, 255]));
        let out = run_pipeline(img, &RemovalConfig::default()).unwrap();
        assert_eq!(out.components.components, 1);
        assert_eq!(*out.composite.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.composite.get_pixel(15, 15), Rgba([90, 140, 60, 255]));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_output_is_opaque_and_same_size() {
        let img = RgbaImage::from_fn(48, 32, |x, y| Rgba([(x * 5) as u8, (y * 7) as u8, 100, 255]));
        let out = run_pipeline(img, &RemovalConfig::default()).unwrap();
        assert_eq!(out.composite.dimensions(), (48, 32));
        assert_eq!(out.cutout.dimensions(), (48, 32));
        assert!(out.composite.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_backdrop_matching_background_is_flagged() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([250, 250, 250, 255]));
        let config = RemovalConfig::builder()
            .backdrop(BackgroundColor::white())
            .build()
            .unwrap();
        let out = run_pipeline(img, &config).unwrap();
        assert!(out.warnings.contains(&QualityWarning::BackdropMatchesBackground));
    }

    #[test]
    fn test_progress_reports_every_stage() {
        let img = RgbaImage::from_pixel(12, 12, Rgba([10, 10, 10, 255]));
        let pipeline = BackdropPipeline::new(RemovalConfig::default()).unwrap();
        let mut tracker = ProgressTracker::no_op();
        pipeline.run_with_progress(img, &mut tracker).unwrap();
        assert_eq!(tracker.current_stage(), Some(&ProcessingStage::Compositing));
    }

    /// Keeps every progress update for inspection
    #[derive(Default)]
    struct RecordingReporter {
        updates: Arc<Mutex<Vec<ProgressUpdate>>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update);
        }

        fn report_completion(&self, _timings: ProcessingTimings) {}

        fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
    }

    #[test]
    fn test_feathering_update_names_radius_and_passes() {
        let reporter = RecordingReporter::default();
        let updates = reporter.updates.clone();
        let mut tracker = ProgressTracker::new(Box::new(reporter));

        let img = RgbaImage::from_pixel(360, 480, Rgba([10, 10, 10, 255]));
        let pipeline = BackdropPipeline::new(RemovalConfig::default()).unwrap();
        pipeline.run_with_progress(img, &mut tracker).unwrap();

        let updates = updates.lock().unwrap();
        let stages: Vec<_> = updates.iter().map(|u| u.stage.clone()).collect();
        assert_eq!(
            stages,
            vec![
                ProcessingStage::BackgroundEstimation,
                ProcessingStage::Classification,
                ProcessingStage::ComponentFiltering,
                ProcessingStage::MaskRefinement,
                ProcessingStage::Feathering,
                ProcessingStage::Compositing,
            ]
        );
        let feathering = &updates[4];
        assert_eq!(
            feathering.description,
            format!("Feathering edges (radius 3, {} passes)", FeatherConfig::default().passes)
        );
    }
}
