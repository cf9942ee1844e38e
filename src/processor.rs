//! Unified background replacement processor
//!
//! `BackgroundRemovalProcessor` owns the validated configuration and wraps the
//! pipeline with decoding, timing, metadata and progress reporting. The CLI
//! and the library entry points both go through it.

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    pipeline::BackdropPipeline,
    services::{ImageIOService, ProcessingStage, ProgressReporter, ProgressTracker},
    types::{ProcessingMetadata, RemovalResult},
};
use image::DynamicImage;
use instant::Instant;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Processor running the heuristic pipeline on decoded or encoded images
pub struct BackgroundRemovalProcessor {
    pipeline: BackdropPipeline,
    progress_tracker: Option<ProgressTracker>,
}

impl BackgroundRemovalProcessor {
    /// Create a processor with a validated configuration
    ///
    /// # Errors
    /// - Any value rejected by [`RemovalConfig::validate`]
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Ok(Self {
            pipeline: BackdropPipeline::new(config)?,
            progress_tracker: None,
        })
    }

    /// Report stage progress to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.progress_tracker = Some(ProgressTracker::new(reporter));
        self
    }

    /// Get the active configuration
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        self.pipeline.config()
    }

    /// Decode and process an image file
    ///
    /// # Errors
    /// - File missing, unreadable or not an image
    /// - Zero-sized image
    pub fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<RemovalResult> {
        let path_ref = input_path.as_ref();
        self.report_stage(ProcessingStage::ImageLoading);

        let decode_start = Instant::now();
        let loaded = std::fs::read(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read image file", path_ref, &e))
            .and_then(|bytes| {
                let format = ImageIOService::detect_format_name(&bytes);
                ImageIOService::load_from_bytes(&bytes).map(|image| (image, format))
            });
        let (image, input_format) = self.track(loaded)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let result = self.process_decoded(&image, decode_ms, input_format)?;
        Ok(result.with_input_path(path_ref.display().to_string()))
    }

    /// Decode and process encoded image bytes
    ///
    /// # Errors
    /// - Empty, unrecognized or corrupt image data
    /// - Zero-sized image
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<RemovalResult> {
        self.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let image = self.track(ImageIOService::load_from_bytes(image_bytes))?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;
        self.process_decoded(&image, decode_ms, ImageIOService::detect_format_name(image_bytes))
    }

    /// Process an already decoded image
    ///
    /// # Errors
    /// - Zero-sized image
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RemovalResult> {
        self.process_decoded(image, 0, "decoded".to_string())
    }

    #[instrument(
        skip(self, image),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    fn process_decoded(
        &mut self,
        image: &DynamicImage,
        decode_ms: u64,
        input_format: String,
    ) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let config = self.pipeline.config().clone();
        debug!(backdrop = %config.backdrop, input_format = %input_format, "Starting background replacement");

        let rgba = image.to_rgba8();
        let output = match self.progress_tracker.as_mut() {
            Some(tracker) => self.pipeline.run_with_progress(rgba, tracker),
            None => self.pipeline.run(rgba),
        };
        let output = self.track(output)?;

        let mut timings = output.timings;
        timings.image_decode_ms = decode_ms;
        timings.total_ms = decode_ms + total_start.elapsed().as_millis() as u64;

        let mask = output.alpha.into_segmentation_mask();
        let mut metadata = ProcessingMetadata::new(config.backdrop);
        metadata.background_estimate = Some(output.estimate);
        metadata.blur_radius = output.blur_radius;
        metadata.components_found = output.components.components;
        metadata.foreground_ratio = mask.statistics().foreground_ratio;
        metadata.input_format = input_format;
        metadata.output_format = config.output_format.to_string();
        for warning in output.warnings {
            metadata.add_warning(warning);
        }
        metadata.timings = timings.clone();

        info!(
            total_ms = timings.total_ms,
            foreground_ratio = metadata.foreground_ratio,
            warnings = metadata.warnings.len(),
            "Processing finished"
        );

        if let Some(tracker) = self.progress_tracker.as_mut() {
            tracker.report_stage(ProcessingStage::Completed);
            tracker.report_completion(timings);
        }

        Ok(RemovalResult::new(
            DynamicImage::ImageRgba8(output.composite),
            output.cutout,
            mask,
            metadata,
        ))
    }

    fn report_stage(&mut self, stage: ProcessingStage) {
        if let Some(tracker) = self.progress_tracker.as_mut() {
            tracker.report_stage(stage);
        }
    }

    /// Forward an error to the progress reporter before returning it
    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let (Err(e), Some(tracker)) = (&result, self.progress_tracker.as_ref()) {
            tracker.report_error(&e.to_string());
        }
        result
    }
}
